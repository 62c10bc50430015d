//! One handler per CLI command.
//!
//! Handlers print the user-facing terminal text themselves and return a
//! structured result; any error they return is reported by the caller.

use chrono::{DateTime, Local, Utc};
use log::{debug, info};
use std::{
    fmt::Write as _,
    io::{self, Write as _},
    time::Duration,
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::check::{CheckOutcome, CheckStatus, check_one, init_resource};
use crate::error::Error;
use crate::fetch::Fetch;
use crate::resolve::{Reference, resolve};
use crate::store::{ResourceStore, Resources};
use crate::worker::{Scheduler, TickReport};

const LIST_URL_WIDTH: usize = 42;
const MONITOR_URL_WIDTH: usize = 60;
const TICK_URL_WIDTH: usize = 50;

pub struct App<F> {
    store: ResourceStore,
    fetcher: F,
}

impl<F: Fetch> App<F> {
    pub fn new(store: ResourceStore, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    /// Starts tracking `url`.
    ///
    /// # Errors
    ///
    /// Fails if `url` is not a URL, is already tracked, the first fetch fails
    /// or the store cannot be saved. Nothing is recorded in any of these cases.
    pub async fn add(&self, url: &str) -> Result<(), Error> {
        Url::parse(url)?;
        let mut resources = self.store.load();
        if resources.contains(url) {
            return Err(Error::AlreadyTracked(url.to_string()));
        }

        println!("Fetching {url}...");
        init_resource(&self.fetcher, url, &mut resources).await?;
        self.store.save(&resources)?;
        println!("✓ Added and initialized: {url}");
        Ok(())
    }

    /// Checks one page (by URL or number) or, without a target, every page.
    ///
    /// # Errors
    ///
    /// Only a failure to save the updated store is an error; per-page
    /// problems are part of the returned outcomes.
    pub async fn check(&self, target: Option<&str>) -> Result<Vec<CheckOutcome>, Error> {
        self.check_to(target, &mut io::stdout()).await
    }

    // Progress goes to `out` before each fetch, so a stalled page is visible.
    async fn check_to<W: io::Write>(
        &self,
        target: Option<&str>,
        out: &mut W,
    ) -> Result<Vec<CheckOutcome>, Error> {
        let mut resources = self.store.load();
        let identifiers: Vec<String> = match target {
            Some(token) => vec![resolve(token, &resources)],
            None => resources.identifiers().map(str::to_string).collect(),
        };

        if identifiers.is_empty() {
            writeln!(out, "No URLs to check. Add some with: pagewatch add <url>")?;
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(identifiers.len());
        for identifier in &identifiers {
            if resources.contains(identifier) {
                write!(out, "Checking {identifier}... ")?;
                out.flush()?;
            }
            let outcome = check_one(&self.fetcher, identifier, &mut resources).await;
            match &outcome.status {
                CheckStatus::NotFound => writeln!(out, "✗ URL not found: {identifier}")?,
                status => writeln!(out, "{}", describe(status))?,
            }
            outcomes.push(outcome);
        }
        self.store.save(&resources)?;

        let changed = outcomes.iter().filter(|o| o.changed()).count();
        if changed > 0 {
            writeln!(out, "\n{changed} page(s) changed!")?;
        }
        Ok(outcomes)
    }

    /// Prints the tracked pages with their ordinal numbers.
    pub fn list(&self) {
        let resources = self.store.load();
        if resources.is_empty() {
            println!("No URLs monitored yet. Add some with: pagewatch add <url>");
        } else {
            print!("{}", render_listing(&resources));
        }
    }

    /// Stops tracking a page. Returns the removed identifier.
    ///
    /// # Errors
    ///
    /// Fails if the reference does not name a tracked page or the store
    /// cannot be saved.
    pub fn remove(&self, token: &str) -> Result<String, Error> {
        let mut resources = self.store.load();
        let url = resolve(token, &resources);
        if resources.remove(&url).is_none() {
            return Err(Error::NotFound(url));
        }
        self.store.save(&resources)?;
        println!("✓ Removed: {url}");
        Ok(url)
    }

    /// Re-checks a single page every `interval` until `token` is cancelled,
    /// tracking it first if needed. Returns the number of checks performed.
    ///
    /// # Errors
    ///
    /// Fails before scheduling anything if the page cannot be initialised.
    pub async fn watch(
        &self,
        reference: &str,
        interval: Duration,
        token: CancellationToken,
    ) -> Result<u64, Error> {
        let mut resources = self.store.load();
        let url = resolve(reference, &resources);
        let mut scheduler = Scheduler::new(&self.fetcher, self.store.clone(), interval)?;

        if !resources.contains(&url) {
            println!("Initializing {url}...");
            init_resource(&self.fetcher, &url, &mut resources).await?;
            self.store.save(&resources)?;
            println!("✓ URL added to monitoring\n");
        }

        println!("Watching: {url}");
        println!(
            "Checking every {} seconds. Press Ctrl+C to stop.\n",
            interval.as_secs()
        );

        let total = scheduler
            .run(&[url.clone()], token, |report| {
                print!("{}", render_watch_tick(report));
            })
            .await;

        println!("\n\n✓ Stopped watching {url}");
        println!("Total checks performed: {total}");
        Ok(total)
    }

    /// Re-checks several tracked pages (all of them when `references` is
    /// empty) every `interval` until `token` is cancelled. Unknown references
    /// are skipped. Returns the number of ticks performed.
    ///
    /// # Errors
    ///
    /// Fails only on an invalid interval.
    pub async fn monitor(
        &self,
        references: &[String],
        interval: Duration,
        token: CancellationToken,
    ) -> Result<u64, Error> {
        let resources = self.store.load();
        let mut scheduler = Scheduler::new(&self.fetcher, self.store.clone(), interval)?;

        let urls = if references.is_empty() {
            resources.identifiers().map(str::to_string).collect()
        } else {
            targets(references, &resources)
        };

        if urls.is_empty() {
            println!("No URLs to monitor. Add some with: pagewatch add <url>");
            return Ok(0);
        }

        println!("Monitoring {} page(s)", urls.len());
        println!(
            "Checking every {} seconds. Press Ctrl+C to stop.\n",
            interval.as_secs()
        );
        for (index, url) in urls.iter().enumerate() {
            println!("  {}. {}", index + 1, shorten(url, MONITOR_URL_WIDTH));
        }
        println!();

        let total = scheduler
            .run(&urls, token, |report| {
                print!("{}", render_monitor_tick(report));
            })
            .await;

        println!("\n\n✓ Stopped monitoring");
        println!("Total checks performed: {total}");
        Ok(total)
    }

    /// Opens a tracked page in the platform browser.
    ///
    /// # Errors
    ///
    /// Fails if the page is not tracked, is not a URL, or the opener cannot be
    /// run.
    pub async fn open(&self, reference: &str) -> Result<String, Error> {
        let resources = self.store.load();
        let url = resolve(reference, &resources);
        if !resources.contains(&url) {
            return Err(Error::NotFound(url));
        }
        let parsed = Url::parse(&url)?;

        println!("Opening {url} in browser...");
        let (program, args) = opener_command(std::env::consts::OS, &parsed);
        let status = Command::new(program)
            .args(&args)
            .status()
            .await
            .map_err(|e| Error::Open(e.to_string()))?;
        if !status.success() {
            return Err(Error::Open(format!("{program} exited with {status}")));
        }
        println!("✓ Opened in browser");
        Ok(url)
    }
}

// Resolves each reference, dropping (and reporting) those that are not tracked.
fn targets(references: &[String], resources: &Resources) -> Vec<String> {
    let mut urls = Vec::new();
    for reference in references {
        let resolved = Reference::parse(reference, resources);
        if let Reference::Ordinal { position, identifier } = &resolved {
            debug!("#{position} resolved to {identifier}");
        }
        let url = resolved.into_identifier();
        if !resources.contains(&url) {
            println!("⚠️  Skipping unknown URL: {reference}");
            info!("Skipping untracked reference {reference}");
            continue;
        }
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

fn describe(status: &CheckStatus) -> String {
    match status {
        CheckStatus::Changed => "CHANGED! ✨".to_string(),
        CheckStatus::Unchanged => "no change".to_string(),
        CheckStatus::NotFound => "not tracked".to_string(),
        CheckStatus::Failed(message) => format!("error: {message}"),
    }
}

fn shorten(url: &str, width: usize) -> String {
    if url.chars().count() > width {
        let kept: String = url.chars().take(width - 3).collect();
        format!("{kept}...")
    } else {
        url.to_string()
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Table of tracked pages as shown by `list`.
#[must_use]
pub fn render_listing(resources: &Resources) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<5}{:<45}{:<20}{:<20}{:<10}",
        "#", "URL", "Last Checked", "Last Changed", "Checks"
    );
    for (index, (url, page)) in resources.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<5}{:<45}{:<20}{:<20}{:<10}",
            index + 1,
            shorten(url, LIST_URL_WIDTH),
            local_time(page.last_checked_at),
            local_time(page.last_changed_at),
            page.check_count
        );
    }
    let _ = writeln!(out, "\nTotal: {} URL(s)", resources.len());
    let _ = writeln!(
        out,
        "Use the number to reference a URL (e.g., \"check 1\" or \"remove 2\")"
    );
    out
}

fn render_watch_tick(report: &TickReport) -> String {
    let timestamp = Local::now().format("%H:%M:%S");
    let mut out = format!("[{timestamp}] Check #{}: ", report.tick);
    for outcome in &report.outcomes {
        out.push_str(&describe(&outcome.status));
        out.push('\n');
        if outcome.changed() {
            let _ = writeln!(out, "🔔 Page has been updated at {timestamp}\n");
        }
    }
    if let Some(e) = &report.save_error {
        let _ = writeln!(out, "error saving state: {e}");
    }
    out
}

fn render_monitor_tick(report: &TickReport) -> String {
    let timestamp = Local::now().format("%H:%M:%S");
    let mut out = format!("[{timestamp}] Check #{}\n", report.tick);
    for outcome in &report.outcomes {
        let _ = writeln!(
            out,
            "  {} ... {}",
            shorten(&outcome.identifier, TICK_URL_WIDTH),
            describe(&outcome.status)
        );
    }
    if let Some(e) = &report.save_error {
        let _ = writeln!(out, "error saving state: {e}");
    }
    match report.changed_count() {
        0 => out.push('\n'),
        changed => {
            let _ = writeln!(out, "\n🔔 {changed} page(s) changed!\n");
        }
    }
    out
}

/// Program and arguments that open `url` in the default browser on `os`
/// (a `std::env::consts::OS` value). No shell is involved, so the URL is
/// always a single argument.
#[must_use]
pub fn opener_command(os: &str, url: &Url) -> (&'static str, Vec<String>) {
    let url = url.as_str().to_string();
    match os {
        "macos" => ("open", vec![url]),
        "windows" => (
            "rundll32",
            vec!["url.dll,FileProtocolHandler".to_string(), url],
        ),
        _ => ("xdg-open", vec![url]),
    }
}
