use crate::error::StorageResult;
use async_trait::async_trait;
use blockmesh_primitives::{Block, BlockMeta, BlockNumber};
use blockmesh_tokio_util::ReadyListener;
use std::{collections::BTreeMap, fmt::Debug, ops::RangeInclusive, sync::Arc};

/// Number of stored copies per height, as returned by
/// [`BlockStorage::analyze_height_range`].
pub type HeightHistogram = BTreeMap<BlockNumber, usize>;

/// Persistence for fetched blocks.
///
/// A height may be stored more than once. Every [`BlockStorage::set_block`] call adds a copy;
/// [`BlockStorage::prune_block`] removes surplus copies.
#[async_trait]
pub trait BlockStorage: Send + Sync + Debug {
    /// Listener for the backend's readiness. Resolves once the backing connection is usable.
    fn ready_listener(&self) -> ReadyListener;

    /// Returns the highest stored height, or [`StorageError::Empty`](crate::StorageError::Empty).
    async fn highest_block_height(&self) -> StorageResult<BlockNumber>;

    /// Stores a copy of `block` at `number`.
    async fn set_block(&self, number: BlockNumber, block: Block, meta: BlockMeta)
        -> StorageResult<()>;

    /// Returns the earliest stored copy at `number`, or
    /// [`StorageError::NotFound`](crate::StorageError::NotFound).
    async fn block(&self, number: BlockNumber) -> StorageResult<Block>;

    /// Returns how many copies are stored at `number`.
    async fn count_redundancy(&self, number: BlockNumber) -> StorageResult<usize>;

    /// Removes copies at `number` until at most `keep` remain, oldest copies are kept.
    ///
    /// Returns the number of removed copies.
    async fn prune_block(&self, number: BlockNumber, keep: usize) -> StorageResult<usize>;

    /// Returns the number of copies for every height in `range`, including heights with zero
    /// copies.
    async fn analyze_height_range(
        &self,
        range: RangeInclusive<BlockNumber>,
    ) -> StorageResult<HeightHistogram>;

    /// Flushes and releases the backend.
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: BlockStorage + ?Sized> BlockStorage for Arc<T> {
    fn ready_listener(&self) -> ReadyListener {
        (**self).ready_listener()
    }

    async fn highest_block_height(&self) -> StorageResult<BlockNumber> {
        (**self).highest_block_height().await
    }

    async fn set_block(
        &self,
        number: BlockNumber,
        block: Block,
        meta: BlockMeta,
    ) -> StorageResult<()> {
        (**self).set_block(number, block, meta).await
    }

    async fn block(&self, number: BlockNumber) -> StorageResult<Block> {
        (**self).block(number).await
    }

    async fn count_redundancy(&self, number: BlockNumber) -> StorageResult<usize> {
        (**self).count_redundancy(number).await
    }

    async fn prune_block(&self, number: BlockNumber, keep: usize) -> StorageResult<usize> {
        (**self).prune_block(number, keep).await
    }

    async fn analyze_height_range(
        &self,
        range: RangeInclusive<BlockNumber>,
    ) -> StorageResult<HeightHistogram> {
        (**self).analyze_height_range(range).await
    }

    async fn close(&self) -> StorageResult<()> {
        (**self).close().await
    }
}
