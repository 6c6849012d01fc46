//! Error types for the sync engine.

use crate::persistence::StorageError;
use quotesync_protocol::{FieldViolation, ProtocolError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// A stale-version rejection is not an error; it is a
/// [`PushOutcome::Rejected`](quotesync_protocol::PushOutcome) routed to the
/// conflict detector.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A gateway call exceeded the request timeout.
    #[error("operation timed out")]
    Timeout,

    /// The payload failed the server's business rules.
    #[error("validation failed: {message}")]
    Validation {
        /// Summary message.
        message: String,
        /// Offending fields.
        violations: Vec<FieldViolation>,
    },

    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Protocol error (invalid message format).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server does not know the document.
    #[error("document not found on server")]
    DocumentNotFound,

    /// No document is loaded in this session.
    #[error("no document loaded")]
    NoDocument,

    /// A conflict is waiting for a resolution.
    #[error("unresolved conflict pending")]
    ConflictPending,

    /// The session is offline.
    #[error("session is offline")]
    Offline,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }

    /// Returns true if this error means the server could not be reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::Timeout)
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}
