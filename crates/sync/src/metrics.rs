use crate::SyncStage;
use blockmesh_primitives::BlockNumber;
use metrics::{counter, gauge};
use std::sync::OnceLock;

const BLOCKS_STORED: &str = "sync.blocks_stored";
const FETCH_ERRORS: &str = "sync.fetch_errors";
const STORE_ERRORS: &str = "sync.store_errors";
const RETRIES: &str = "sync.retries";
const QUEUE_PENDING: &str = "sync.queue_pending";
const IN_FLIGHT: &str = "sync.in_flight";
const WRITE_POINTER: &str = "sync.write_pointer";

static DESCRIPTORS: OnceLock<()> = OnceLock::new();

/// Sync engine metrics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SyncMetrics;

impl SyncMetrics {
    pub(crate) fn new() -> Self {
        DESCRIPTORS.get_or_init(|| {
            metrics::describe_counter!(BLOCKS_STORED, "Total number of stored blocks");
            metrics::describe_counter!(FETCH_ERRORS, "Total number of failed block fetches");
            metrics::describe_counter!(STORE_ERRORS, "Total number of failed block stores");
            metrics::describe_counter!(RETRIES, "Total number of scheduled retries");
            metrics::describe_gauge!(QUEUE_PENDING, "Number of tasks waiting for a worker");
            metrics::describe_gauge!(IN_FLIGHT, "Number of tasks being executed");
            metrics::describe_gauge!(WRITE_POINTER, "Highest height ever enqueued");
        });
        Self
    }

    pub(crate) fn block_stored(&self) {
        counter!(BLOCKS_STORED).increment(1);
    }

    pub(crate) fn task_failed(&self, stage: Option<SyncStage>) {
        match stage {
            Some(SyncStage::Store) => counter!(STORE_ERRORS).increment(1),
            _ => counter!(FETCH_ERRORS).increment(1),
        }
    }

    pub(crate) fn retry_scheduled(&self) {
        counter!(RETRIES).increment(1);
    }

    pub(crate) fn set_queue(&self, pending: usize, in_flight: usize) {
        gauge!(QUEUE_PENDING).set(pending as f64);
        gauge!(IN_FLIGHT).set(in_flight as f64);
    }

    pub(crate) fn set_write_pointer(&self, pointer: BlockNumber) {
        gauge!(WRITE_POINTER).set(pointer as f64);
    }
}
