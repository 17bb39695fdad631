use crate::StoredBlock;
use async_trait::async_trait;
use blockmesh_interfaces::{
    storage::{BlockStorage, HeightHistogram},
    StorageError, StorageResult,
};
use blockmesh_primitives::{Block, BlockMeta, BlockNumber};
use blockmesh_tokio_util::{Readiness, ReadyListener};
use parking_lot::RwLock;
use std::{collections::BTreeMap, ops::RangeInclusive};
use tracing::trace;

/// Blocks kept in a map, lost on drop.
///
/// Ready as soon as it is created.
#[derive(Debug)]
pub struct MemoryStorage {
    blocks: RwLock<BTreeMap<BlockNumber, Vec<StoredBlock>>>,
    readiness: Readiness,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        let readiness = Readiness::new();
        readiness.mark_ready();
        Self { blocks: RwLock::new(BTreeMap::new()), readiness }
    }

    /// Every stored copy at `number`, earliest first.
    pub fn copies(&self, number: BlockNumber) -> Vec<StoredBlock> {
        self.blocks.read().get(&number).cloned().unwrap_or_default()
    }

    /// Stored heights in ascending order.
    pub fn heights(&self) -> Vec<BlockNumber> {
        self.blocks.read().keys().copied().collect()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockStorage for MemoryStorage {
    fn ready_listener(&self) -> ReadyListener {
        self.readiness.listener()
    }

    async fn highest_block_height(&self) -> StorageResult<BlockNumber> {
        self.blocks.read().keys().next_back().copied().ok_or(StorageError::Empty)
    }

    async fn set_block(
        &self,
        number: BlockNumber,
        block: Block,
        meta: BlockMeta,
    ) -> StorageResult<()> {
        trace!(target: "storage::memory", number, "Storing block");
        self.blocks.write().entry(number).or_default().push(StoredBlock { block, meta });
        Ok(())
    }

    async fn block(&self, number: BlockNumber) -> StorageResult<Block> {
        self.blocks
            .read()
            .get(&number)
            .and_then(|copies| copies.first())
            .map(|stored| stored.block.clone())
            .ok_or(StorageError::NotFound(number))
    }

    async fn count_redundancy(&self, number: BlockNumber) -> StorageResult<usize> {
        Ok(self.blocks.read().get(&number).map_or(0, Vec::len))
    }

    async fn prune_block(&self, number: BlockNumber, keep: usize) -> StorageResult<usize> {
        let mut blocks = self.blocks.write();
        let Some(copies) = blocks.get_mut(&number) else { return Ok(0) };
        let removed = copies.len().saturating_sub(keep);
        copies.truncate(keep);
        if copies.is_empty() {
            blocks.remove(&number);
        }
        if removed > 0 {
            trace!(target: "storage::memory", number, removed, "Pruned block copies");
        }
        Ok(removed)
    }

    async fn analyze_height_range(
        &self,
        range: RangeInclusive<BlockNumber>,
    ) -> StorageResult<HeightHistogram> {
        let blocks = self.blocks.read();
        Ok(range
            .map(|number| (number, blocks.get(&number).map_or(0, Vec::len)))
            .collect())
    }
}
