use blockmesh_primitives::BlockNumber;
use thiserror::Error;

/// Result alias for result of a node request.
pub type RequestResult<T> = Result<T, RequestError>;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error variants that can happen when sending requests to a node.
///
/// All of them are transient from the point of view of the sync engine: a failed request is
/// retried later, possibly against a different node.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RequestError {
    /// The node did not answer in time.
    #[error("request timed out while awaiting response")]
    Timeout,
    /// The transport failed before a response was received.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node answered with an RPC level error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Error code returned by the node.
        code: i32,
        /// Error message returned by the node.
        message: String,
    },
    /// The response could not be interpreted.
    #[error("received bad response: {0}")]
    BadResponse(String),
    /// The handle was closed.
    #[error("node handle is closed")]
    Closed,
}

// === impl RequestError ===

impl RequestError {
    /// Indicates whether this error is worth retrying against the same node.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }

    /// Whether the error happened because the handle was closed.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Errors returned by a [`BlockStorage`](crate::storage::BlockStorage) implementation.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StorageError {
    /// No block is stored at the requested height.
    #[error("block {0} not found")]
    NotFound(BlockNumber),
    /// The storage holds no blocks at all.
    #[error("storage is empty")]
    Empty,
    /// The backing connection is not established yet.
    #[error("storage is not ready")]
    NotReady,
    /// The backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A stored document could not be encoded or decoded.
    #[error("storage codec error: {0}")]
    Codec(String),
}

impl StorageError {
    /// Returns true for the "nothing there" class of errors.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(RequestError::Timeout.is_retryable());
        assert!(RequestError::Transport("reset".into()).is_retryable());
        assert!(!RequestError::BadResponse("garbage".into()).is_retryable());
        assert!(!RequestError::Closed.is_retryable());
        assert!(RequestError::Closed.is_closed());
    }

    #[test]
    fn not_found_classes() {
        assert!(StorageError::NotFound(1).is_not_found());
        assert!(StorageError::Empty.is_not_found());
        assert!(!StorageError::NotReady.is_not_found());
        assert_eq!(StorageError::NotFound(7).to_string(), "block 7 not found");
    }
}
