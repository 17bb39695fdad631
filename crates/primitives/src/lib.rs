#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Commonly used types in blockmesh.
//!
//! Blocks are treated as opaque payloads keyed by their height. Nothing in this crate interprets
//! the payload contents.

mod block;
mod priority;
pub mod serde_helper;

pub use block::{Block, BlockMeta};
pub use bytes::Bytes;
pub use priority::Priority;

/// Height of a block in the chain. The unit of work of the sync engine.
pub type BlockNumber = u64;
