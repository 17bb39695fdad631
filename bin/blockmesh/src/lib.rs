//! blockmesh: ingest blocks from a pool of JSON-RPC nodes into local storage.
//!
//! The binary wires the workspace crates together:
//!
//! - [`blockmesh_node`] talks to a single node,
//! - [`blockmesh_mesh`] tracks the health of all nodes and picks one per request,
//! - [`blockmesh_sync`] drives the fetch pipeline,
//! - [`blockmesh_storage`] persists what was fetched.

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod args;
pub mod cli;
pub mod commands;
pub mod events;
pub mod runner;
