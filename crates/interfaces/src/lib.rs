//! blockmesh interface bindings
//!
//! The sync core talks to the outside world through two narrow contracts: a [`NodeClient`] that
//! reaches one RPC endpoint and a [`BlockStorage`] that persists blocks by height.
//!
//! ## Feature Flags
//!
//! - `test-utils`: Export scripted clients for testing
//!
//! [`NodeClient`]: node::NodeClient
//! [`BlockStorage`]: storage::BlockStorage

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Node transport traits.
pub mod node;

/// Block storage traits.
pub mod storage;

mod error;
pub use error::{RequestError, RequestResult, StorageError, StorageResult};

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers for mocking out nodes.
pub mod test_utils;
