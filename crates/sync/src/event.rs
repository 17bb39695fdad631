use crate::SyncError;
use blockmesh_primitives::BlockNumber;

/// Progress notifications broadcast by the [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A block was fetched and stored.
    BlockStored {
        /// Height of the block.
        height: BlockNumber,
        /// Endpoint of the node it was fetched from.
        source: String,
    },
    /// Storage already held enough copies, nothing was fetched.
    BlockSkipped {
        /// Height of the block.
        height: BlockNumber,
        /// Copies found in storage.
        copies: usize,
    },
    /// A task failed and will be retried.
    TaskFailed {
        /// Height of the task.
        height: BlockNumber,
        /// Why it failed.
        error: SyncError,
    },
    /// A failed height will be enqueued again after the retry delay.
    RetryScheduled {
        /// Height of the task.
        height: BlockNumber,
        /// Number of retries scheduled for this height so far.
        attempt: u32,
    },
    /// Surplus copies were removed by the verification sweep.
    Pruned {
        /// Height of the block.
        height: BlockNumber,
        /// Number of removed copies.
        removed: usize,
    },
}
