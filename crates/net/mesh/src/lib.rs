//! The node mesh.
//!
//! A [`Mesh`] owns a fixed set of [`NodeHandle`](blockmesh_node::NodeHandle)s for its lifetime,
//! keeps their health fresh with background probes and answers selection queries over them.
//!
//! ## Probing
//!
//! [`Mesh::start_benchmark`] probes every node whose activity is still unknown once and then arms
//! three periodic activities:
//!
//! - every `benchmark_interval` the most stale node that is not already being probed gets a
//!   height probe,
//! - every `fetch_missing_user_agent_interval` nodes without a known user agent are asked for one,
//! - every `refresh_user_agent_interval` all user agents are refreshed.
//!
//! Probe failures are logged and swallowed. They degrade selection quality, never availability.
//!
//! ## Readiness
//!
//! The mesh becomes ready once `min_active_nodes_required` nodes are active. The transition
//! happens at most once and is never undone, see [`Mesh::ready_listener`].

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod error;
pub use error::MeshError;

mod mesh;
pub use mesh::{Mesh, NodeStatus};

mod metrics;

pub mod selection;
