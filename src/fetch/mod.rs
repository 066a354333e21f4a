//! Session seam between the harvest loop and the external question source.
//!
//! The source sits behind anti-bot defenses, so fetching happens through a
//! stateful session that is expensive to build and may break at any time.
//!
//! # Architecture
//!
//! - [`SessionFactory`] - Builds a new [`FetchSession`] (may fail transiently)
//! - [`FetchSession`] - Fetches one identifier at a time; owned by the harvest loop
//! - [`FetchError`] - Connect / session-lost / item failures, see [`FetchError::disposition`]
//! - [`GraphqlSessionFactory`] - reqwest implementation against a GraphQL endpoint
//!
//! # Object Safety
//!
//! Both traits use `async_trait` so sessions can be held as
//! `Box<dyn FetchSession>` and factories shared as `Arc<dyn SessionFactory>`.

mod error;
mod graphql;
mod payload;

pub use error::{FailureDisposition, FetchError};
pub use graphql::{DEFAULT_BASE_URL, DEFAULT_WARMUP_SLUG, GraphqlSessionFactory, QUESTION_QUERY};
pub use payload::{RawPayload, TopicTag};

use async_trait::async_trait;

/// Builds fetch sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Returns the factory's name for logging (e.g., "graphql").
    fn name(&self) -> &str;

    /// Establishes a new session.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Connect`] when the session cannot be established.
    async fn connect(&self) -> Result<Box<dyn FetchSession>, FetchError>;
}

/// A live, stateful session able to fetch question payloads.
#[async_trait]
pub trait FetchSession: Send {
    /// Fetches the payload for `identifier`.
    ///
    /// Returns `Ok(None)` when the source answers but has no data for the item.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::SessionLost`] when the session is broken, or
    /// [`FetchError::Item`] for failures specific to this item.
    async fn fetch(&mut self, identifier: &str) -> Result<Option<RawPayload>, FetchError>;

    /// Releases the session. Best effort; never fails.
    async fn close(&mut self) {}
}
