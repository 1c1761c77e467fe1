//! Error types for the sync engine.

use docsync_protocol::{PartitionId, ProtocolError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while paging or writing documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Network or server failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether re-issuing the same operation may succeed.
        retryable: bool,
    },

    /// The caller is not signed in and the partition requires it.
    #[error("not authorized to access the {0} partition")]
    Unauthorized(PartitionId),

    /// The remote store refused the caller's credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The target document does not exist remotely.
    #[error("document {document_id:?} not found in the {partition} partition")]
    NotFound {
        /// Partition that was searched.
        partition: PartitionId,
        /// Missing document id.
        document_id: String,
    },

    /// A create targeted an id that already exists.
    #[error("document {document_id:?} already exists in the {partition} partition")]
    AlreadyExists {
        /// Target partition.
        partition: PartitionId,
        /// Conflicting document id.
        document_id: String,
    },

    /// Local writes are not allowed in this partition.
    #[error("the {0} partition is read-only")]
    ReadOnlyPartition(PartitionId),

    /// The store answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Encoding, decoding or validation failure.
    #[error("codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// A completion arrived for a cursor that was not waiting for it.
    #[error("invalid state transition for {partition} from {from} to {to}")]
    InvalidStateTransition {
        /// Partition whose cursor was affected.
        partition: PartitionId,
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Not connected.
    #[error("not connected to the document store")]
    NotConnected,
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

    /// Creates a not-found error.
    pub fn not_found(partition: PartitionId, document_id: impl Into<String>) -> Self {
        Self::NotFound {
            partition,
            document_id: document_id.into(),
        }
    }

    /// Returns true if this error can be retried by re-issuing the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::NotConnected => true,
            _ => false,
        }
    }

    /// Returns true if the caller must sign in before trying again.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            SyncError::Unauthorized(_) | SyncError::AuthenticationFailed(_)
        )
    }

    /// Returns true if the target document is confirmed absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Returns true if the store's response could not be understood.
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            SyncError::Protocol(_) | SyncError::Codec(ProtocolError::DecodingFailed { .. })
        )
    }
}
