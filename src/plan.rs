//! Queue selection for a harvest run.
//!
//! Selection happens in three steps, always in this order:
//!
//! 1. The [`QueueSource`] picks the candidate identifiers.
//! 2. `resume` drops identifiers that already have a record.
//! 3. `limit` truncates the queue.
//!
//! In repair mode the records being repaired count as absent for step 2, and
//! only the records that survive step 3 are deleted from the store.

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::audit::record_issues;
use crate::source::{SourceError, discover_identifiers};
use crate::store::{RecordStore, StoreError};

/// Where the candidate identifiers come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSource {
    /// Every identifier listed in the CSV files of a directory.
    All {
        /// Directory holding the listings.
        input_dir: PathBuf,
    },
    /// One identifier.
    Single(String),
    /// The store's failure set.
    RetryFailed,
    /// Stored records that are content-unavailable, flagged or unreadable.
    RepairIncomplete,
}

/// Filters applied after the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Skip identifiers that already have a record.
    pub resume: bool,
    /// Keep at most this many identifiers.
    pub limit: Option<usize>,
}

/// The selected queue and what selection did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueuePlan {
    /// Identifiers to harvest, in order.
    pub queue: Vec<String>,
    /// Candidates before the resume and limit steps.
    pub candidates: usize,
    /// Candidates dropped because a record already exists.
    pub skipped_existing: usize,
    /// Records deleted for repair.
    pub removed: Vec<String>,
}

impl QueuePlan {
    /// Returns true when there is nothing to harvest.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Errors that can occur while planning a queue.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Identifier discovery failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The store could not be read or a repair deletion failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Selects the queue for a run.
///
/// # Errors
///
/// Returns [`PlanError`] if discovery fails or the store cannot be read.
/// In repair mode a failed deletion is also an error.
#[instrument(skip(store))]
pub fn plan_queue(
    source: &QueueSource,
    store: &RecordStore,
    options: PlanOptions,
) -> Result<QueuePlan, PlanError> {
    let candidates = match source {
        QueueSource::All { input_dir } => discover_identifiers(input_dir)?,
        QueueSource::Single(identifier) => vec![identifier.clone()],
        QueueSource::RetryFailed => store.load_failures()?.unwrap_or_default(),
        QueueSource::RepairIncomplete => incomplete_records(store)?,
    };
    let repairing = matches!(source, QueueSource::RepairIncomplete);

    let mut plan = QueuePlan {
        candidates: candidates.len(),
        ..QueuePlan::default()
    };

    let mut queue = if options.resume && !repairing {
        let existing: HashSet<String> = store.identifiers()?.into_iter().collect();
        let remaining: Vec<String> = candidates
            .into_iter()
            .filter(|identifier| !existing.contains(identifier))
            .collect();
        plan.skipped_existing = plan.candidates - remaining.len();
        info!(
            skipped = plan.skipped_existing,
            remaining = remaining.len(),
            "resuming"
        );
        remaining
    } else {
        candidates
    };

    if let Some(limit) = options.limit {
        queue.truncate(limit);
    }

    if repairing {
        for identifier in &queue {
            if store.remove(identifier)? {
                plan.removed.push(identifier.clone());
            }
        }
        info!(removed = plan.removed.len(), "incomplete records removed for re-fetch");
    }

    plan.queue = queue;
    Ok(plan)
}

/// Lists stored records worth fetching again, sorted.
fn incomplete_records(store: &RecordStore) -> Result<Vec<String>, StoreError> {
    let mut incomplete = Vec::new();
    for identifier in store.identifiers()? {
        match store.load(&identifier) {
            Ok(Some(record)) => {
                if !record.has_content() || !record_issues(&record).is_empty() {
                    incomplete.push(identifier);
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(identifier, %error, "unreadable record queued for repair");
                incomplete.push(identifier);
            }
        }
    }
    Ok(incomplete)
}
