//! Watch web pages for content changes.
//!
//! Each tracked page is fetched, hashed and compared to the fingerprint
//! recorded on its previous check. The records live in a single JSON file that
//! is reloaded and rewritten around every operation.

pub mod check;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod resolve;
pub mod store;
pub mod worker;

pub use check::{CheckOutcome, CheckStatus, check_all, check_one, init_resource};
pub use error::Error;
pub use fetch::{Fetch, HttpFetcher};
pub use resolve::{Reference, resolve};
pub use store::{ResourceStore, Resources, TrackedResource};
pub use worker::{Scheduler, SchedulerState, TickReport};
