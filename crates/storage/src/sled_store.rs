use crate::StoredBlock;
use async_trait::async_trait;
use blockmesh_interfaces::{
    storage::{BlockStorage, HeightHistogram},
    StorageError, StorageResult,
};
use blockmesh_primitives::{Block, BlockMeta, BlockNumber};
use blockmesh_tokio_util::{Readiness, ReadyListener};
use std::{
    ops::RangeInclusive,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info};

/// Name of the tree holding block documents.
const BLOCKS_TREE: &str = "blocks";

/// Blocks persisted as JSON documents in a sled database.
///
/// Keys are the big-endian height followed by a big-endian id from
/// [`sled::Db::generate_id`], so copies of a height are adjacent and ordered by write time.
#[derive(Debug)]
pub struct SledStorage {
    db: sled::Db,
    blocks: sled::Tree,
    readiness: Readiness,
    closed: AtomicBool,
}

impl SledStorage {
    /// Opens (or creates) the database at `path`.
    ///
    /// `flush_every_ms` overrides sled's background flush period.
    pub fn open(path: impl AsRef<Path>, flush_every_ms: Option<u64>) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut config = sled::Config::new().path(path);
        if let Some(ms) = flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }
        let db = config.open().map_err(backend)?;
        let blocks = db.open_tree(BLOCKS_TREE).map_err(backend)?;

        let readiness = Readiness::new();
        readiness.mark_ready();
        info!(target: "storage::sled", path = %path.display(), "Opened block database");
        Ok(Self { db, blocks, readiness, closed: AtomicBool::new(false) })
    }

    /// Opens a database that lives in memory and is removed on drop.
    pub fn temporary() -> StorageResult<Self> {
        let db = sled::Config::new().temporary(true).open().map_err(backend)?;
        let blocks = db.open_tree(BLOCKS_TREE).map_err(backend)?;
        let readiness = Readiness::new();
        readiness.mark_ready();
        Ok(Self { db, blocks, readiness, closed: AtomicBool::new(false) })
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(StorageError::NotReady)
        }
        Ok(())
    }

    /// Keys of every copy stored at `number`, earliest first.
    fn copy_keys(&self, number: BlockNumber) -> StorageResult<Vec<sled::IVec>> {
        self.blocks
            .scan_prefix(number.to_be_bytes())
            .keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)
    }
}

fn key(number: BlockNumber, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&number.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

fn height_of(key: &[u8]) -> StorageResult<BlockNumber> {
    let bytes: [u8; 8] = key
        .get(..8)
        .and_then(|prefix| prefix.try_into().ok())
        .ok_or_else(|| StorageError::Codec(format!("malformed key of {} bytes", key.len())))?;
    Ok(BlockNumber::from_be_bytes(bytes))
}

fn backend(err: sled::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn decode(value: &[u8]) -> StorageResult<StoredBlock> {
    serde_json::from_slice(value).map_err(|err| StorageError::Codec(err.to_string()))
}

#[async_trait]
impl BlockStorage for SledStorage {
    fn ready_listener(&self) -> ReadyListener {
        self.readiness.listener()
    }

    async fn highest_block_height(&self) -> StorageResult<BlockNumber> {
        self.ensure_open()?;
        match self.blocks.last().map_err(backend)? {
            Some((key, _)) => height_of(&key),
            None => Err(StorageError::Empty),
        }
    }

    async fn set_block(
        &self,
        number: BlockNumber,
        block: Block,
        meta: BlockMeta,
    ) -> StorageResult<()> {
        self.ensure_open()?;
        let document = serde_json::to_vec(&StoredBlock { block, meta })
            .map_err(|err| StorageError::Codec(err.to_string()))?;
        let id = self.db.generate_id().map_err(backend)?;
        self.blocks.insert(key(number, id), document).map_err(backend)?;
        debug!(target: "storage::sled", number, id, "Stored block");
        Ok(())
    }

    async fn block(&self, number: BlockNumber) -> StorageResult<Block> {
        self.ensure_open()?;
        match self.blocks.scan_prefix(number.to_be_bytes()).values().next() {
            Some(value) => Ok(decode(&value.map_err(backend)?)?.block),
            None => Err(StorageError::NotFound(number)),
        }
    }

    async fn count_redundancy(&self, number: BlockNumber) -> StorageResult<usize> {
        self.ensure_open()?;
        Ok(self.copy_keys(number)?.len())
    }

    async fn prune_block(&self, number: BlockNumber, keep: usize) -> StorageResult<usize> {
        self.ensure_open()?;
        let keys = self.copy_keys(number)?;
        let mut removed = 0;
        for key in keys.into_iter().skip(keep) {
            if self.blocks.remove(key).map_err(backend)?.is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(target: "storage::sled", number, removed, "Pruned block copies");
        }
        Ok(removed)
    }

    async fn analyze_height_range(
        &self,
        range: RangeInclusive<BlockNumber>,
    ) -> StorageResult<HeightHistogram> {
        self.ensure_open()?;
        let (start, end) = range.into_inner();
        let mut histogram: HeightHistogram =
            (start..=end).map(|number| (number, 0)).collect();
        if start > end {
            return Ok(histogram)
        }
        for entry in self.blocks.range(key(start, 0)..=key(end, u64::MAX)).keys() {
            let number = height_of(&entry.map_err(backend)?)?;
            *histogram.entry(number).or_default() += 1;
        }
        Ok(histogram)
    }

    async fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(())
        }
        let flushed = self.db.flush_async().await.map_err(backend)?;
        info!(target: "storage::sled", flushed, "Closed block database");
        Ok(())
    }
}
