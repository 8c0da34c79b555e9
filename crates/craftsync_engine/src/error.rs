//! Error types for the sync engine.

use craftsync_protocol::RecordId;
use craftsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// No identity could be resolved; the pass was aborted before any item ran.
    #[error("no identity available; sync pass aborted")]
    MissingIdentity,

    /// The transport failed before the remote could answer.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a later attempt may succeed.
        retryable: bool,
    },

    /// The remote answered with a non-success status.
    #[error("remote returned status {status}: {message}")]
    RemoteStatus {
        /// HTTP-style status code.
        status: u16,
        /// Error message from the remote.
        message: String,
    },

    /// The remote rejected the presented identity.
    #[error("identity rejected by remote")]
    Unauthorized,

    /// The remote does not know the record.
    #[error("record {0} not found at remote")]
    NotFound(RecordId),

    /// The wire payload could not be produced or understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The record is not present in the local store.
    #[error("unknown record: {0}")]
    UnknownRecord(RecordId),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        SyncError::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a fatal transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        SyncError::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        SyncError::Protocol(message.into())
    }

    /// Returns true if a failed push attempt should stay queued and retry
    /// on a later pass.
    ///
    /// Identity rejections count as retryable: the provider is invalidated
    /// and the next pass resolves fresh credentials.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::RemoteStatus { .. } => true,
            SyncError::Unauthorized => true,
            SyncError::NotFound(_) => true,
            SyncError::MissingIdentity
            | SyncError::Protocol(_)
            | SyncError::Store(_)
            | SyncError::UnknownRecord(_) => false,
        }
    }
}
