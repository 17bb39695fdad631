//! Block storage backends.
//!
//! Both backends keep every copy written for a height, in write order, so redundancy is
//! observable and prunable. Reads return the earliest copy.
//!
//! - [`MemoryStorage`]: a map behind a lock, for tests and light mode.
//! - [`SledStorage`]: a persistent document store on top of [`sled`].

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use blockmesh_config::StorageConfig;
use blockmesh_interfaces::{storage::BlockStorage, StorageResult};
use blockmesh_primitives::{Block, BlockMeta};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod memory;
pub use memory::MemoryStorage;

mod sled_store;
pub use sled_store::SledStorage;

/// One stored copy of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    /// The payload as returned by the node.
    pub block: Block,
    /// Where the payload came from.
    #[serde(default)]
    pub meta: BlockMeta,
}

/// Opens the backend selected by `config`.
pub fn open(config: &StorageConfig) -> StorageResult<Arc<dyn BlockStorage>> {
    Ok(match config {
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
        StorageConfig::Sled { path, flush_every_ms } => {
            Arc::new(SledStorage::open(path, *flush_every_ms)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_configured_backend() {
        let memory = open(&StorageConfig::Memory).unwrap();
        assert!(memory.ready_listener().is_ready());

        let dir = tempfile::tempdir().unwrap();
        let sled = open(&StorageConfig::Sled { path: dir.path().join("db"), flush_every_ms: None })
            .unwrap();
        sled.set_block(1, Block::from(vec![1u8]), BlockMeta::default()).await.unwrap();
        assert_eq!(sled.highest_block_height().await, Ok(1));
    }
}
