//! Configuration files.
use blockmesh_primitives::BlockNumber;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Default number of concurrently executing sync tasks.
pub const DEFAULT_WORKER_COUNT: usize = 30;

/// Default ceiling for pending sync tasks.
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 1000;

/// Errors raised by [`Config::validate`].
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds a value that can never work.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

const fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

/// Configuration for the blockmesh binary.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Config {
    /// The RPC endpoints to sync from.
    pub nodes: NodesConfig,
    /// Health tracking and selection.
    pub mesh: MeshConfig,
    /// The block fetch pipeline.
    pub sync: SyncConfig,
    /// Where blocks are persisted.
    pub storage: StorageConfig,
}

impl Config {
    /// Loads the config from `path`, writing the defaults there if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, confy::ConfyError> {
        confy::load_path(path.as_ref())
    }

    /// Writes the config to `path` as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), confy::ConfyError> {
        confy::store_path(path.as_ref(), self)
    }

    /// Rejects configurations that would fail at construction time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.nodes.validate()?;
        self.mesh.validate()?;
        self.sync.validate()
    }
}

/// RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct NodesConfig {
    /// Endpoint URLs, one node handle is created per entry.
    pub endpoints: Vec<String>,
    /// Upper bound for a single request against a node.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self { endpoints: Vec::new(), request_timeout: Duration::from_secs(30) }
    }
}

impl NodesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(invalid("nodes.request_timeout", "must be non-zero"))
        }
        Ok(())
    }
}

/// Health tracking and selection configuration.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Start probing as soon as the mesh is created.
    pub start_benchmark_on_init: bool,
    /// Whether nodes are asked for their user agent.
    pub fetch_user_agent: bool,
    /// How often the most stale node is probed.
    #[serde(with = "humantime_serde")]
    pub benchmark_interval: Duration,
    /// How often nodes without a known user agent are asked for one.
    #[serde(with = "humantime_serde")]
    pub fetch_missing_user_agent_interval: Duration,
    /// How often every node's user agent is refreshed.
    #[serde(with = "humantime_serde")]
    pub refresh_user_agent_interval: Duration,
    /// Number of active nodes that flips the mesh to ready.
    pub min_active_nodes_required: usize,
    /// Nodes with more in-flight requests than this are considered overloaded.
    pub pending_requests_threshold: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            start_benchmark_on_init: true,
            fetch_user_agent: true,
            benchmark_interval: Duration::from_secs(2),
            fetch_missing_user_agent_interval: Duration::from_secs(5),
            // 5min
            refresh_user_agent_interval: Duration::from_secs(5 * 60),
            min_active_nodes_required: 2,
            pending_requests_threshold: 5,
        }
    }
}

impl MeshConfig {
    /// Rejects zero intervals and an unreachable readiness threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_active_nodes_required == 0 {
            return Err(invalid("mesh.min_active_nodes_required", "must be at least 1"))
        }
        if self.benchmark_interval.is_zero() ||
            self.fetch_missing_user_agent_interval.is_zero() ||
            self.refresh_user_agent_interval.is_zero()
        {
            return Err(invalid("mesh intervals", "must be non-zero"))
        }
        Ok(())
    }
}

/// Block fetch pipeline configuration.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of concurrently executing fetch and store tasks.
    pub worker_count: usize,
    /// The engine stops proactively enqueueing once this many tasks are pending.
    pub max_queue_length: usize,
    /// First height to sync.
    pub start_block_index: BlockNumber,
    /// Last height to sync. Follows the highest height known to the mesh when unset.
    pub target_block_height: Option<BlockNumber>,
    /// How often an idle queue is topped up.
    #[serde(with = "humantime_serde")]
    pub top_up_interval: Duration,
    /// Cooldown before a failed height is enqueued again.
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Upper bound for fetching one block.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Upper bound for storing one block.
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
    /// Periodic sweep for missing and redundant heights.
    pub verification: VerificationConfig,
    /// Number of copies each height should have in storage.
    pub block_redundancy: usize,
    /// Skip the fetch when storage already holds enough copies.
    pub check_redundancy_before_store: bool,
    /// Remove copies above `block_redundancy` during verification.
    pub prune_redundant_blocks: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            start_block_index: 0,
            target_block_height: None,
            top_up_interval: Duration::from_secs(2),
            retry_delay: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(30),
            verification: VerificationConfig::default(),
            block_redundancy: 1,
            check_redundancy_before_store: true,
            prune_redundant_blocks: true,
        }
    }
}

impl SyncConfig {
    /// Rejects bounds the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(invalid("sync.worker_count", "must be at least 1"))
        }
        if self.max_queue_length == 0 {
            return Err(invalid("sync.max_queue_length", "must be at least 1"))
        }
        if self.block_redundancy == 0 {
            return Err(invalid("sync.block_redundancy", "must be at least 1"))
        }
        if self.top_up_interval.is_zero() {
            return Err(invalid("sync.top_up_interval", "must be non-zero"))
        }
        if self.fetch_timeout.is_zero() || self.store_timeout.is_zero() {
            return Err(invalid("sync timeouts", "must be non-zero"))
        }
        if self.verification.enabled && self.verification.interval.is_zero() {
            return Err(invalid("sync.verification.interval", "must be non-zero"))
        }
        if self.verification.max_heights_per_sweep == 0 {
            return Err(invalid("sync.verification.max_heights_per_sweep", "must be at least 1"))
        }
        if matches!(self.target_block_height, Some(target) if target < self.start_block_index) {
            return Err(invalid("sync.target_block_height", "must not be below the start index"))
        }
        Ok(())
    }
}

/// Verification sweep configuration.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Whether the sweep runs at all.
    pub enabled: bool,
    /// Time between sweeps.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Upper bound for the heights a single sweep analyzes. Consecutive sweeps continue where
    /// the previous one stopped.
    pub max_heights_per_sweep: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { enabled: true, interval: Duration::from_secs(60), max_heights_per_sweep: 10_000 }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Keep blocks in memory.
    #[default]
    Memory,
    /// Persist blocks in a sled database.
    Sled {
        /// Database directory.
        path: PathBuf,
        /// Background flush period in milliseconds, sled's default when unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flush_every_ms: Option<u64>,
    },
}
