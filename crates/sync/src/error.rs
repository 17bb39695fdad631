use blockmesh_config::ConfigError;
use blockmesh_interfaces::{RequestError, StorageError};
use blockmesh_primitives::BlockNumber;
use std::fmt;

/// Result alias for [`SyncError`].
pub type SyncResult<T> = Result<T, SyncError>;

/// Step of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    /// Fetching the block from a node.
    Fetch,
    /// Handing the block to storage.
    Store,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Store => f.write_str("store"),
        }
    }
}

/// Errors of the sync engine.
///
/// Only [`SyncError::InvalidConfig`] and [`SyncError::HeightBelowStart`] are returned to callers.
/// The remaining variants describe why a task failed and never leave the task boundary, they are
/// logged, broadcast as [`SyncEvent::TaskFailed`](crate::SyncEvent::TaskFailed) and retried.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The configuration can never work.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    /// Heights below the configured start are never synced.
    #[error("block {height} is below the start index {start}")]
    HeightBelowStart {
        /// The rejected height.
        height: BlockNumber,
        /// The configured start index.
        start: BlockNumber,
    },
    /// No node reported the height yet.
    #[error("no node can serve block {height}")]
    NoNodeAvailable {
        /// The requested height.
        height: BlockNumber,
    },
    /// The node request failed.
    #[error("failed to fetch block: {0}")]
    Fetch(#[from] RequestError),
    /// Storage rejected the block.
    #[error("failed to store block: {0}")]
    Store(#[from] StorageError),
    /// A step did not complete in time.
    #[error("{stage} of block {height} timed out")]
    Timeout {
        /// The height of the task.
        height: BlockNumber,
        /// The step that timed out.
        stage: SyncStage,
    },
}

impl SyncError {
    /// Step the error is attributed to, if it is a task failure.
    pub const fn stage(&self) -> Option<SyncStage> {
        match self {
            Self::NoNodeAvailable { .. } | Self::Fetch(_) => Some(SyncStage::Fetch),
            Self::Store(_) => Some(SyncStage::Store),
            Self::Timeout { stage, .. } => Some(*stage),
            Self::InvalidConfig(_) | Self::HeightBelowStart { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_stage() {
        assert_eq!(SyncError::NoNodeAvailable { height: 1 }.stage(), Some(SyncStage::Fetch));
        assert_eq!(SyncError::Fetch(RequestError::Timeout).stage(), Some(SyncStage::Fetch));
        assert_eq!(SyncError::Store(StorageError::NotReady).stage(), Some(SyncStage::Store));
        assert_eq!(
            SyncError::Timeout { height: 1, stage: SyncStage::Store }.stage(),
            Some(SyncStage::Store)
        );
        assert_eq!(SyncError::HeightBelowStart { height: 1, start: 2 }.stage(), None);
        assert_eq!(
            SyncError::Timeout { height: 9, stage: SyncStage::Fetch }.to_string(),
            "fetch of block 9 timed out"
        );
    }
}
