//! Standalone crate for blockmesh configuration types.

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod config;
pub use config::{
    Config, ConfigError, MeshConfig, NodesConfig, StorageConfig, SyncConfig, VerificationConfig,
};
