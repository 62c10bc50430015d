use log::{error, info};
use std::time::Duration;
use tokio::{
    select,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::check::{CheckOutcome, check_all};
use crate::error::Error;
use crate::fetch::Fetch;
use crate::store::ResourceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

/// Result of one pass over all targeted pages.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// 1-based tick number within this run.
    pub tick: u64,
    pub outcomes: Vec<CheckOutcome>,
    /// Set when the end-of-tick save failed; the next tick reloads whatever
    /// is on disk.
    pub save_error: Option<String>,
}

impl TickReport {
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.changed()).count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error().is_some()).count()
    }
}

/// Re-checks a fixed set of pages on an interval until cancelled.
pub struct Scheduler<F> {
    fetcher: F,
    store: ResourceStore,
    interval: Duration,
    ticks: u64,
    state: SchedulerState,
}

impl<F: Fetch> Scheduler<F> {
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero interval.
    pub fn new(fetcher: F, store: ResourceStore, interval: Duration) -> Result<Self, Error> {
        if interval.is_zero() {
            return Err(Error::Config("interval must be at least one second".into()));
        }
        Ok(Self {
            fetcher,
            store,
            interval,
            ticks: 0,
            state: SchedulerState::Running,
        })
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Performs one tick: reload the store, check every identifier in order,
    /// save once.
    pub async fn tick(&mut self, identifiers: &[String]) -> TickReport {
        self.ticks += 1;
        info!("Check #{}: {} page(s)", self.ticks, identifiers.len());

        let mut resources = self.store.load();
        let outcomes = check_all(&self.fetcher, identifiers, &mut resources).await;

        let save_error = self.store.save(&resources).err().map(|e| {
            error!("Failed to save {}: {e}", self.store.path().display());
            e.to_string()
        });

        TickReport {
            tick: self.ticks,
            outcomes,
            save_error,
        }
    }

    /// Ticks immediately, then once per interval, until `token` is cancelled.
    ///
    /// Cancellation is only observed between ticks, so an in-flight tick
    /// always finishes, including its save. Ticks never overlap: one that
    /// overruns the interval delays the next. Returns the total tick count.
    pub async fn run<C>(
        &mut self,
        identifiers: &[String],
        token: CancellationToken,
        mut on_tick: C,
    ) -> u64
    where
        C: FnMut(&TickReport),
    {
        if self.state == SchedulerState::Stopped {
            return self.ticks;
        }

        info!("Starting page monitoring...");
        info!("Check interval: {} seconds", self.interval.as_secs());
        info!("Monitoring {} page(s)", identifiers.len());

        let mut timer = time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;
                () = token.cancelled() => {
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
                _ = timer.tick() => {}
            }

            let report = self.tick(identifiers).await;
            on_tick(&report);
        }

        self.state = SchedulerState::Stopped;
        info!(
            "Page monitoring stopped gracefully after {} check(s)",
            self.ticks
        );
        self.ticks
    }
}
