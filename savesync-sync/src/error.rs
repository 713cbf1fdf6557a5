//! Error types for the sync layer.

use savesync_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The device reports no connectivity.
    #[error("no connectivity")]
    Offline,

    /// Network error (connection refused, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The remote store answered with a non-success status.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The remote store answered with something that is not a snapshot.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid operation transition or snapshot encoding failure.
    #[error(transparent)]
    State(#[from] savesync_types::Error),

    /// No tracked operation with this id.
    #[error("operation not found: {0}")]
    OperationNotFound(String),

    /// The operation exists but is not waiting for conflict decisions.
    #[error("operation {0} is not awaiting resolution")]
    NotAwaitingResolution(String),

    /// A blocking storage task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Whether retrying the same transport call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
