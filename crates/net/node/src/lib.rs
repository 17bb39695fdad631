//! Handles for the RPC endpoints a mesh is built from.
//!
//! A [`NodeHandle`] wraps any [`NodeClient`](blockmesh_interfaces::node::NodeClient) and keeps
//! the health record selection works on: activity, latency, reported height, user agent, the
//! number of requests in flight and when the node was last probed.
//!
//! [`RpcClient`] is the JSON-RPC transport used in production.

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod handle;
pub use handle::{NodeHandle, NodeHealth};

mod rpc;
pub use rpc::RpcClient;
