//! The sync engine.
//!
//! A [`SyncEngine`] ingests blocks height by height. It owns a write pointer, the highest height
//! ever enqueued, and a bounded priority queue of fetch tasks drained by a fixed number of
//! workers. Each task asks the [`Mesh`](blockmesh_mesh::Mesh) for the optimal node, fetches the
//! block and hands it to [`BlockStorage`](blockmesh_interfaces::storage::BlockStorage).
//!
//! ## Scheduling
//!
//! - After every completed task the queue is refilled with the heights following the write
//!   pointer, up to `max_queue_length` pending tasks and the target height.
//! - A top-up timer enqueues the next height whenever the queue has drained.
//! - A failed task is enqueued again after `retry_delay` in the [`Priority::RETRY`] lane, ahead
//!   of forward progress.
//! - A verification sweep re-enqueues heights that are missing from storage and prunes surplus
//!   copies.
//!
//! The write pointer advances when a height is enqueued, not when it completes. A height that
//! keeps failing is only completed through its retries and the verification sweep.
//!
//! [`Priority::RETRY`]: blockmesh_primitives::Priority::RETRY

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod engine;
pub use engine::SyncEngine;

mod error;
pub use error::{SyncError, SyncResult, SyncStage};

mod event;
pub use event::SyncEvent;

mod metrics;

mod queue;
pub use queue::SyncTask;

mod verify;
pub use verify::SweepReport;
