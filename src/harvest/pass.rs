//! One sweep of the harvest state machine over a queue.
//!
//! ```text
//!              connect ok                       queue exhausted
//!  NoSession ──────────────▶ Fetching(session) ─────────────────▶ Done
//!    ▲   │                     │      ▲   │
//!    │   │ connect failed      │      │   │ saved / no data / item error:
//!    │   └─ sleep, retry       │      │   │ advance, jitter
//!    │                         │      └───┘
//!    │      session lost       ▼
//!    └──────────────────── Cooldown (close session, item kept)
//! ```
//!
//! The session is owned by the [`PassState::Fetching`] value, so dropping
//! back to `NoSession` always discards it.

use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use super::Harvester;
use crate::fetch::{FailureDisposition, FetchError, FetchSession, RawPayload};

/// Why an identifier failed in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The source answered without data for the identifier.
    NoData,
    /// The store can never hold a record for the identifier; it was not fetched.
    Rejected(String),
    /// The fetch or the save failed.
    Error(String),
}

/// One failed identifier of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassFailure {
    pub identifier: String,
    pub reason: FailureReason,
}

/// How an identifier was settled in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Record written to the given path.
    Saved(PathBuf),
    /// No data returned.
    NoData,
    /// Not fetched: the identifier cannot name a record.
    Rejected(String),
    /// Failed with the given reason.
    Failed(String),
}

/// Result of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// 1-based pass number.
    pub pass: u32,
    /// Identifiers in the pass queue.
    pub attempted: usize,
    /// Identifiers saved.
    pub succeeded: usize,
    /// Failed identifiers in queue order.
    pub failures: Vec<PassFailure>,
    /// Sessions discarded after being lost.
    pub session_restarts: u32,
}

impl PassOutcome {
    fn new(pass: u32, attempted: usize) -> Self {
        Self {
            pass,
            attempted,
            ..Self::default()
        }
    }

    /// Returns the failed identifiers in queue order.
    #[must_use]
    pub fn failed_identifiers(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.identifier.clone()).collect()
    }

    /// Splits failures into those worth another pass and those that are not.
    ///
    /// Errors are always retryable; no-data results only when `retry_no_data`.
    /// Rejected identifiers are never retried.
    #[must_use]
    pub fn split_failures(&self, retry_no_data: bool) -> (Vec<String>, Vec<String>) {
        let (retryable, parked): (Vec<&PassFailure>, Vec<&PassFailure>) =
            self.failures.iter().partition(|f| match f.reason {
                FailureReason::Rejected(_) => false,
                FailureReason::NoData => retry_no_data,
                FailureReason::Error(_) => true,
            });
        (
            retryable.into_iter().map(|f| f.identifier.clone()).collect(),
            parked.into_iter().map(|f| f.identifier.clone()).collect(),
        )
    }

    fn settle(&mut self, identifier: &str, outcome: &ItemOutcome) {
        let reason = match outcome {
            ItemOutcome::Saved(_) => {
                self.succeeded += 1;
                return;
            }
            ItemOutcome::NoData => FailureReason::NoData,
            ItemOutcome::Rejected(reason) => FailureReason::Rejected(reason.clone()),
            ItemOutcome::Failed(reason) => FailureReason::Error(reason.clone()),
        };
        self.failures.push(PassFailure {
            identifier: identifier.to_string(),
            reason,
        });
    }
}

/// State of the pass loop.
pub enum PassState {
    /// No live session; the next step connects.
    NoSession,
    /// A live session, exclusively owned by the loop.
    Fetching(Box<dyn FetchSession>),
    /// The session was lost; wait before reconnecting.
    Cooldown,
    /// Queue exhausted.
    Done,
}

impl std::fmt::Debug for PassState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoSession => "NoSession",
            Self::Fetching(_) => "Fetching",
            Self::Cooldown => "Cooldown",
            Self::Done => "Done",
        };
        f.write_str(name)
    }
}

impl Harvester {
    /// Runs one pass over `queue` and reports what happened to each identifier.
    ///
    /// Never fails: every identifier ends up saved or in the outcome's failures.
    /// A lost session is rebuilt and the same identifier fetched again, so an
    /// identifier is never skipped because a session broke.
    /// Identifiers the store would refuse are settled as rejected without a fetch.
    #[instrument(skip(self, queue), fields(items = queue.len()))]
    pub async fn run_pass(&self, pass: u32, queue: &[String]) -> PassOutcome {
        let total = queue.len();
        let mut outcome = PassOutcome::new(pass, total);
        let mut state = PassState::NoSession;
        let mut index = 0;
        let mut losses_on_item = 0;

        info!(pass, total, "pass started");
        self.observer.pass_started(pass, total);

        loop {
            if matches!(state, PassState::NoSession | PassState::Fetching(_)) {
                self.reject_unstorable(queue, &mut index, &mut outcome);
            }

            state = match state {
                PassState::Done => break,

                PassState::NoSession if index >= total => PassState::Done,

                PassState::NoSession => self.connect(index, total).await,

                PassState::Cooldown => {
                    debug!(
                        cooldown_secs = self.settings.crash_cooldown.as_secs_f64(),
                        "waiting before reconnect"
                    );
                    tokio::time::sleep(self.settings.crash_cooldown).await;
                    PassState::NoSession
                }

                PassState::Fetching(mut session) => {
                    let Some(identifier) = queue.get(index) else {
                        session.close().await;
                        state = PassState::Done;
                        continue;
                    };

                    info!("[{}/{}] {identifier}", index + 1, total);
                    self.observer.item_started(index + 1, total, identifier);

                    match session.fetch(identifier).await {
                        Ok(payload) => {
                            let item = self.persist(identifier, payload.as_ref());
                            self.advance(&mut outcome, &mut index, total, identifier, &item)
                                .await;
                            losses_on_item = 0;
                            PassState::Fetching(session)
                        }
                        Err(error) if error.disposition() == FailureDisposition::SoftFailure => {
                            warn!(identifier = %identifier, %error, "item failed");
                            let item = ItemOutcome::Failed(error.to_string());
                            self.advance(&mut outcome, &mut index, total, identifier, &item)
                                .await;
                            losses_on_item = 0;
                            PassState::Fetching(session)
                        }
                        // Session lost. A connect error from a live session counts too.
                        Err(error) => {
                            session.close().await;
                            drop(session);
                            outcome.session_restarts += 1;
                            losses_on_item += 1;
                            warn!(
                                identifier = %identifier,
                                %error,
                                consecutive = losses_on_item,
                                "session lost, rebuilding"
                            );

                            if self.restart_limit_reached(losses_on_item) {
                                let item = ItemOutcome::Failed(session_loss_reason(
                                    losses_on_item,
                                    &error,
                                ));
                                self.settle_without_jitter(
                                    &mut outcome,
                                    &mut index,
                                    identifier,
                                    &item,
                                );
                                losses_on_item = 0;
                            }
                            if index >= total {
                                PassState::Done
                            } else {
                                PassState::Cooldown
                            }
                        }
                    }
                }
            };
        }

        info!(
            pass,
            succeeded = outcome.succeeded,
            failed = outcome.failures.len(),
            session_restarts = outcome.session_restarts,
            "pass finished"
        );
        self.observer.pass_finished(&outcome);
        outcome
    }

    async fn connect(&self, index: usize, total: usize) -> PassState {
        match self.factory.connect().await {
            Ok(session) => {
                info!(
                    factory = self.factory.name(),
                    at = index + 1,
                    total,
                    "session established"
                );
                PassState::Fetching(session)
            }
            Err(error) => {
                warn!(
                    factory = self.factory.name(),
                    %error,
                    retry_in_secs = self.settings.session_retry_delay.as_secs_f64(),
                    "session construction failed"
                );
                tokio::time::sleep(self.settings.session_retry_delay).await;
                PassState::NoSession
            }
        }
    }

    /// Settles every identifier from `index` on that the store would refuse,
    /// without fetching it.
    fn reject_unstorable(&self, queue: &[String], index: &mut usize, outcome: &mut PassOutcome) {
        while let Some(identifier) = queue.get(*index) {
            let Err(error) = self.store.record_path(identifier) else {
                break;
            };
            warn!(identifier = %identifier, %error, "identifier rejected, not fetching");
            self.observer.item_started(*index + 1, queue.len(), identifier);
            let item = ItemOutcome::Rejected(error.to_string());
            self.settle_without_jitter(outcome, index, identifier, &item);
        }
    }

    fn persist(&self, identifier: &str, payload: Option<&RawPayload>) -> ItemOutcome {
        let Some(raw) = payload else {
            warn!(identifier, "no data returned");
            return ItemOutcome::NoData;
        };

        let record = self.builder.build(identifier, raw);
        match self.store.save(&record) {
            Ok(path) => {
                info!(identifier, title = %record.title, "saved");
                ItemOutcome::Saved(path)
            }
            Err(error) => {
                warn!(identifier, %error, "record could not be saved");
                ItemOutcome::Failed(error.to_string())
            }
        }
    }

    async fn advance(
        &self,
        outcome: &mut PassOutcome,
        index: &mut usize,
        total: usize,
        identifier: &str,
        item: &ItemOutcome,
    ) {
        self.settle_without_jitter(outcome, index, identifier, item);
        if *index < total {
            let delay = self.settings.pacing.next_delay();
            debug!(delay_ms = delay.as_millis(), "pacing");
            tokio::time::sleep(delay).await;
        }
    }

    fn settle_without_jitter(
        &self,
        outcome: &mut PassOutcome,
        index: &mut usize,
        identifier: &str,
        item: &ItemOutcome,
    ) {
        outcome.settle(identifier, item);
        self.observer.item_finished(identifier, item);
        *index += 1;
    }

    fn restart_limit_reached(&self, losses: u32) -> bool {
        self.settings.max_session_restarts > 0 && losses >= self.settings.max_session_restarts
    }
}

fn session_loss_reason(losses: u32, error: &FetchError) -> String {
    format!("session lost {losses} times in a row: {error}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn failure(identifier: &str, reason: FailureReason) -> PassFailure {
        PassFailure {
            identifier: identifier.to_string(),
            reason,
        }
    }

    #[test]
    fn test_split_failures_parks_no_data_by_default() {
        let outcome = PassOutcome {
            failures: vec![
                failure("a", FailureReason::Error("HTTP 503".to_string())),
                failure("b", FailureReason::NoData),
                failure("c", FailureReason::Error("timeout".to_string())),
            ],
            ..PassOutcome::default()
        };

        let (retryable, parked) = outcome.split_failures(false);
        assert_eq!(retryable, vec!["a", "c"]);
        assert_eq!(parked, vec!["b"]);

        let (retryable, parked) = outcome.split_failures(true);
        assert_eq!(retryable, vec!["a", "b", "c"]);
        assert!(parked.is_empty());
    }

    #[test]
    fn test_split_failures_never_retries_rejected() {
        let outcome = PassOutcome {
            failures: vec![
                failure("_bad", FailureReason::Rejected("reserved prefix".to_string())),
                failure("a", FailureReason::Error("HTTP 503".to_string())),
            ],
            ..PassOutcome::default()
        };

        for retry_no_data in [false, true] {
            let (retryable, parked) = outcome.split_failures(retry_no_data);
            assert_eq!(retryable, vec!["a"]);
            assert_eq!(parked, vec!["_bad"]);
        }
    }

    #[test]
    fn test_settle_counts_success_and_failures() {
        let mut outcome = PassOutcome::new(1, 3);
        outcome.settle("a", &ItemOutcome::Saved(PathBuf::from("a.json")));
        outcome.settle("b", &ItemOutcome::NoData);
        outcome.settle("c", &ItemOutcome::Failed("boom".to_string()));

        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed_identifiers(), vec!["b", "c"]);
        assert_eq!(outcome.failures[0].reason, FailureReason::NoData);
    }

    #[test]
    fn test_pass_state_debug_hides_session() {
        assert_eq!(format!("{:?}", PassState::Cooldown), "Cooldown");
    }
}
