//! Crash-recovering harvest loop.
//!
//! A [`Harvester`] drives one stateful fetch session at a time through a
//! queue of identifiers and persists one record per identifier.
//!
//! # Overview
//!
//! - [`Harvester::run_pass`] - One sweep over a queue (see [`pass`] for the state machine)
//! - [`Harvester::run`] - Initial pass plus up to `max_retries` retry passes over failures
//! - [`Pacing`] - Randomized delay between items
//! - [`HarvestObserver`] - Progress hooks for the operator-facing surface
//!
//! # Failure Handling
//!
//! | Event | Effect |
//! |-------|--------|
//! | Session construction fails | Wait `session_retry_delay`, connect again, queue untouched |
//! | Session lost mid-fetch | Close, wait `crash_cooldown`, reconnect, same item again |
//! | Item error / no data | Recorded for the pass, queue advances |
//! | Record cannot be saved | Recorded for the pass, queue advances |
//!
//! Failures left after the last pass are written to the store's failure set;
//! a run with no failures clears it.

mod pacing;
pub mod pass;

pub use pacing::{DEFAULT_DELAY_MAX, DEFAULT_DELAY_MIN, Pacing};
pub use pass::{FailureReason, ItemOutcome, PassFailure, PassOutcome};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::fetch::SessionFactory;
use crate::record::RecordBuilder;
use crate::store::{RecordStore, StoreError};

/// Default number of retry passes after the initial pass.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Default wait before retrying session construction (15 seconds).
pub const DEFAULT_SESSION_RETRY_DELAY: Duration = Duration::from_secs(15);

/// Default wait after a session is lost (5 seconds).
pub const DEFAULT_CRASH_COOLDOWN: Duration = Duration::from_secs(5);

/// Default wait between outer passes (10 seconds).
pub const DEFAULT_PASS_COOLDOWN: Duration = Duration::from_secs(10);

/// Default number of consecutive session losses tolerated on one item.
pub const DEFAULT_MAX_SESSION_RESTARTS: u32 = 5;

/// Errors that abort a harvest run.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The delay range is negative, non-finite, or inverted.
    #[error("invalid delay range {min}s..{max}s: min must be <= max and both non-negative")]
    InvalidDelayRange {
        /// Requested lower bound in seconds.
        min: f64,
        /// Requested upper bound in seconds.
        max: f64,
    },

    /// The failure set could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables for a harvest run.
///
/// # Default Values
///
/// - `pacing`: 1.5s to 3.5s
/// - `max_retries`: 3
/// - `session_retry_delay`: 15 seconds
/// - `crash_cooldown`: 5 seconds
/// - `pass_cooldown`: 10 seconds
/// - `max_session_restarts`: 5
/// - `retry_no_data`: false
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Delay between consecutive items.
    pub pacing: Pacing,
    /// Retry passes allowed after the initial pass.
    pub max_retries: u32,
    /// Wait after a failed session construction.
    pub session_retry_delay: Duration,
    /// Wait after a lost session before reconnecting.
    pub crash_cooldown: Duration,
    /// Wait between outer passes.
    pub pass_cooldown: Duration,
    /// Consecutive session losses on one item before it is failed for the pass.
    /// Zero disables the limit.
    pub max_session_restarts: u32,
    /// Re-queue items that returned no data in later passes.
    pub retry_no_data: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            session_retry_delay: DEFAULT_SESSION_RETRY_DELAY,
            crash_cooldown: DEFAULT_CRASH_COOLDOWN,
            pass_cooldown: DEFAULT_PASS_COOLDOWN,
            max_session_restarts: DEFAULT_MAX_SESSION_RESTARTS,
            retry_no_data: false,
        }
    }
}

impl HarvestSettings {
    /// Settings with every wait set to zero. Retry budget and limits keep their defaults.
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            pacing: Pacing::none(),
            session_retry_delay: Duration::ZERO,
            crash_cooldown: Duration::ZERO,
            pass_cooldown: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sets the retry budget, capped at [`MAX_RETRIES_LIMIT`].
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.min(MAX_RETRIES_LIMIT);
        self
    }
}

/// Progress hooks. All methods default to no-ops.
pub trait HarvestObserver: Send + Sync {
    /// A pass over `total` identifiers is starting.
    fn pass_started(&self, _pass: u32, _total: usize) {}

    /// Fetching the identifier at 1-based `position` is starting.
    fn item_started(&self, _position: usize, _total: usize, _identifier: &str) {}

    /// The identifier was settled for this pass.
    fn item_finished(&self, _identifier: &str, _outcome: &ItemOutcome) {}

    /// A pass is complete.
    fn pass_finished(&self, _outcome: &PassOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HarvestObserver for NoopObserver {}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    /// Passes executed, including the initial one.
    pub passes: u32,
    /// Identifiers saved across all passes.
    pub succeeded: usize,
    /// Identifiers still failing, in queue order.
    pub residual_failures: Vec<String>,
    /// Where the failure set was written, when non-empty.
    pub failures_path: Option<PathBuf>,
}

impl HarvestSummary {
    /// Returns true when every identifier was saved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.residual_failures.is_empty()
    }
}

/// Drives sessions from a [`SessionFactory`] over identifier queues.
pub struct Harvester {
    factory: Arc<dyn SessionFactory>,
    store: RecordStore,
    builder: RecordBuilder,
    settings: HarvestSettings,
    observer: Arc<dyn HarvestObserver>,
}

impl std::fmt::Debug for Harvester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harvester")
            .field("factory", &self.factory.name())
            .field("store", &self.store.root())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Harvester {
    /// Creates a harvester writing into `store`.
    #[must_use]
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        store: RecordStore,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            factory,
            store,
            builder: RecordBuilder::default(),
            settings,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replaces the record builder.
    #[must_use]
    pub fn with_builder(mut self, builder: RecordBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Installs a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn HarvestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs the initial pass and the retry passes, then publishes the failure set.
    ///
    /// Duplicate identifiers are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Store`] if the failure set cannot be written or
    /// cleared. Per-item failures never abort the run.
    #[instrument(skip(self, queue), fields(items = queue.len(), max_retries = self.settings.max_retries))]
    pub async fn run(&self, queue: Vec<String>) -> Result<HarvestSummary, HarvestError> {
        let queue = dedupe(queue);
        let mut pending = queue.clone();
        let mut parked: HashSet<String> = HashSet::new();
        let mut succeeded = 0;
        let mut pass = 1;

        let last_failures = loop {
            let outcome = self.run_pass(pass, &pending).await;
            succeeded += outcome.succeeded;

            let (retryable, not_retried) = outcome.split_failures(self.settings.retry_no_data);
            parked.extend(not_retried);

            if retryable.is_empty() || pass > self.settings.max_retries {
                break retryable;
            }

            info!(
                pass,
                failed = retryable.len(),
                cooldown_secs = self.settings.pass_cooldown.as_secs_f64(),
                "retrying failures after cooldown"
            );
            tokio::time::sleep(self.settings.pass_cooldown).await;
            pending = retryable;
            pass += 1;
        };

        let remaining: HashSet<String> = last_failures.into_iter().chain(parked).collect();
        let residual_failures: Vec<String> = queue
            .into_iter()
            .filter(|identifier| remaining.contains(identifier))
            .collect();

        let failures_path = if residual_failures.is_empty() {
            self.store.clear_failures()?;
            None
        } else {
            self.store.save_failures(&residual_failures)?;
            warn!(
                failed = residual_failures.len(),
                path = %self.store.failures_path().display(),
                "failures remain after retry budget"
            );
            Some(self.store.failures_path())
        };

        info!(passes = pass, succeeded, failed = residual_failures.len(), "harvest finished");

        Ok(HarvestSummary {
            passes: pass,
            succeeded,
            residual_failures,
            failures_path,
        })
    }
}

fn dedupe(queue: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    queue
        .into_iter()
        .filter(|identifier| seen.insert(identifier.clone()))
        .collect()
}
