//! Error types for the fetch module.
//!
//! Fetch errors are split by what they say about the session: whether it
//! could not be built, whether it broke, or whether only one item failed.

use thiserror::Error;

/// Errors that can occur while connecting a session or fetching an item.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The session could not be established (warm-up failed, client build failed).
    #[error("session could not be established: {reason}")]
    Connect {
        /// Why construction failed.
        reason: String,
    },

    /// The session is no longer usable and must be rebuilt.
    #[error("session lost while fetching {identifier}: {reason}")]
    SessionLost {
        /// The item being fetched when the session broke.
        identifier: String,
        /// What signalled the broken session.
        reason: String,
    },

    /// A failure specific to one item; the session stays usable.
    #[error("fetch failed for {identifier}: {reason}")]
    Item {
        /// The item that failed.
        identifier: String,
        /// Why the fetch failed.
        reason: String,
    },
}

/// What the harvest loop should do after a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Stay without a session, wait, and connect again. Does not consume the queue.
    RetryConnect,

    /// Discard the session and fetch the same item with a new one.
    RebuildSession,

    /// Record the item as failed for this pass and move on.
    SoftFailure,
}

impl FetchError {
    /// Creates a connect error.
    pub fn connect(reason: impl Into<String>) -> Self {
        Self::Connect {
            reason: reason.into(),
        }
    }

    /// Creates a session-lost error.
    pub fn session_lost(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionLost {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Creates an item error.
    pub fn item(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Item {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Classifies the error for the harvest loop.
    ///
    /// | Error | Disposition |
    /// |-------|-------------|
    /// | `Connect` | `RetryConnect` |
    /// | `SessionLost` | `RebuildSession` |
    /// | `Item` | `SoftFailure` |
    #[must_use]
    pub fn disposition(&self) -> FailureDisposition {
        match self {
            Self::Connect { .. } => FailureDisposition::RetryConnect,
            Self::SessionLost { .. } => FailureDisposition::RebuildSession,
            Self::Item { .. } => FailureDisposition::SoftFailure,
        }
    }

    /// Returns true when the session must be discarded.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        self.disposition() == FailureDisposition::RebuildSession
    }
}
