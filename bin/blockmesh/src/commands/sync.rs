//! Main sync command
//!
//! Starts the mesh, waits for it to become ready and ingests blocks until the process is asked
//! to exit.
use crate::{
    args::{build_mesh, NodeArgs},
    events,
    runner::CliContext,
};
use blockmesh_config::{Config, StorageConfig};
use blockmesh_interfaces::storage::BlockStorage;
use blockmesh_primitives::BlockNumber;
use blockmesh_sync::SyncEngine;
use clap::Args;
use eyre::WrapErr;
use std::path::PathBuf;
use tracing::{info, warn};

/// Directory inside `--datadir` holding the block database.
const BLOCKS_DIR: &str = "blocks";

/// Start syncing blocks from the configured nodes.
#[derive(Debug, Clone, Args)]
pub struct Command {
    #[command(flatten)]
    nodes: NodeArgs,

    /// The first height to sync.
    #[arg(long, value_name = "HEIGHT")]
    start: Option<BlockNumber>,

    /// Stop at this height instead of following the highest node.
    #[arg(long, value_name = "HEIGHT")]
    target: Option<BlockNumber>,

    /// The number of concurrent fetch workers.
    #[arg(long, value_name = "COUNT")]
    workers: Option<usize>,

    /// Persist blocks in a sled database inside this directory instead of the configured
    /// storage.
    #[arg(long, value_name = "PATH")]
    datadir: Option<PathBuf>,
}

impl Command {
    /// The config with every flag applied.
    fn config(&self) -> eyre::Result<Config> {
        let mut config = self.nodes.load_config()?;
        if let Some(start) = self.start {
            config.sync.start_block_index = start;
        }
        if let Some(target) = self.target {
            config.sync.target_block_height = Some(target);
        }
        if let Some(workers) = self.workers {
            config.sync.worker_count = workers;
        }
        if let Some(datadir) = &self.datadir {
            config.storage =
                StorageConfig::Sled { path: datadir.join(BLOCKS_DIR), flush_every_ms: None };
        }
        config.validate()?;
        Ok(config)
    }

    /// Execute `sync` command
    pub async fn execute(self, ctx: CliContext) -> eyre::Result<()> {
        let CliContext { mut shutdown } = ctx;
        let config = self.config()?;
        info!(target: "blockmesh::cli", nodes = config.nodes.endpoints.len(), "Starting sync");

        let storage =
            blockmesh_storage::open(&config.storage).wrap_err("could not open block storage")?;
        let mesh = build_mesh(&config)?;

        let mut mesh_ready = mesh.ready_listener();
        let mut storage_ready = storage.ready_listener();
        let ready = async { mesh_ready.wait().await && storage_ready.wait().await };
        let ready = tokio::select! {
            ready = ready => ready,
            _ = &mut shutdown => false,
        };

        if ready {
            if let Ok(height) = storage.highest_block_height().await {
                info!(target: "blockmesh::cli", height, "Found stored blocks");
            }

            let engine = SyncEngine::new(config.sync, mesh.clone(), storage.clone())?;
            let events = engine.events();
            engine.start();

            tokio::select! {
                _ = &mut shutdown => {},
                _ = events::handle_events(engine.clone(), events) => {
                    warn!(target: "blockmesh::cli", "Sync event stream ended");
                },
            }

            info!(target: "blockmesh::cli", "Stopping sync");
            engine.close().await;
        } else {
            warn!(target: "blockmesh::cli", "Exiting before the mesh became ready");
        }

        mesh.close();
        storage.close().await.wrap_err("could not flush block storage")?;
        info!(target: "blockmesh::cli", "Shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct CommandParser<T: Args> {
        #[command(flatten)]
        args: T,
    }

    #[test]
    fn flags_override_config() {
        let command = CommandParser::<Command>::parse_from([
            "blockmesh",
            "--node",
            "http://a:10332",
            "--start",
            "10",
            "--target",
            "20",
            "--workers",
            "4",
            "--datadir",
            "/data",
        ])
        .args;
        let config = command.config().unwrap();
        assert_eq!(config.nodes.endpoints, vec!["http://a:10332"]);
        assert_eq!(config.sync.start_block_index, 10);
        assert_eq!(config.sync.target_block_height, Some(20));
        assert_eq!(config.sync.worker_count, 4);
        assert_eq!(
            config.storage,
            StorageConfig::Sled { path: PathBuf::from("/data/blocks"), flush_every_ms: None }
        );
    }

    #[test]
    fn rejects_target_below_start() {
        let command = CommandParser::<Command>::parse_from([
            "blockmesh",
            "--start",
            "10",
            "--target",
            "5",
        ])
        .args;
        assert!(command.config().is_err());
    }
}
