use chrono::Utc;
use log::{debug, info, warn};

use crate::error::Error;
use crate::fetch::Fetch;
use crate::fingerprint::fingerprint;
use crate::store::{Resources, TrackedResource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Unchanged,
    Changed,
    /// The identifier is not tracked; nothing was fetched.
    NotFound,
    /// The fetch failed; the stored record was left as it was.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub identifier: String,
    pub status: CheckStatus,
}

impl CheckOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        self.status == CheckStatus::Changed
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        match &self.status {
            CheckStatus::Failed(message) => Some(message.clone()),
            CheckStatus::NotFound => Some(Error::NotFound(self.identifier.clone()).to_string()),
            CheckStatus::Unchanged | CheckStatus::Changed => None,
        }
    }
}

/// Fetches one tracked page and updates its record in `resources`.
///
/// Persisting `resources` afterwards is up to the caller.
pub async fn check_one<F: Fetch>(
    fetcher: &F,
    identifier: &str,
    resources: &mut Resources,
) -> CheckOutcome {
    let outcome = |status| CheckOutcome {
        identifier: identifier.to_string(),
        status,
    };

    if !resources.contains(identifier) {
        return outcome(CheckStatus::NotFound);
    }

    let content = match fetcher.fetch(identifier).await {
        Ok(content) => content,
        Err(e) => {
            warn!("{identifier}: {e}");
            return outcome(CheckStatus::Failed(e.to_string()));
        }
    };
    let new_fingerprint = fingerprint(content.as_bytes());

    let Some(record) = resources.get_mut(identifier) else {
        return outcome(CheckStatus::NotFound);
    };
    let now = Utc::now();
    record.last_checked_at = now;
    record.check_count += 1;

    if record.fingerprint == new_fingerprint {
        debug!("{identifier}: no change");
        outcome(CheckStatus::Unchanged)
    } else {
        info!("{identifier}: changed");
        record.fingerprint = new_fingerprint;
        record.last_changed_at = now;
        outcome(CheckStatus::Changed)
    }
}

/// Runs [`check_one`] for every identifier in order. One failure never stops
/// the rest of the batch.
pub async fn check_all<F: Fetch>(
    fetcher: &F,
    identifiers: &[String],
    resources: &mut Resources,
) -> Vec<CheckOutcome> {
    let mut outcomes = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        outcomes.push(check_one(fetcher, identifier, resources).await);
    }
    outcomes
}

/// Starts tracking `identifier` from a first fetch.
///
/// # Errors
///
/// Returns [`Error::AlreadyTracked`] if the identifier is present (the record
/// is left untouched), or the fetch error, in which case no record is created.
pub async fn init_resource<F: Fetch>(
    fetcher: &F,
    identifier: &str,
    resources: &mut Resources,
) -> Result<(), Error> {
    if resources.contains(identifier) {
        return Err(Error::AlreadyTracked(identifier.to_string()));
    }

    let content = fetcher.fetch(identifier).await?;
    resources.insert(
        identifier,
        TrackedResource::new(fingerprint(content.as_bytes()), Utc::now()),
    );
    info!("{identifier}: now tracked");
    Ok(())
}
