use metrics::{counter, gauge};
use std::sync::OnceLock;

const ACTIVE_NODES: &str = "mesh.active_nodes";
const PROBE_FAILURES: &str = "mesh.probe_failures";

static DESCRIPTORS: OnceLock<()> = OnceLock::new();

/// Mesh health metrics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MeshMetrics;

impl MeshMetrics {
    pub(crate) fn new() -> Self {
        DESCRIPTORS.get_or_init(|| {
            metrics::describe_gauge!(ACTIVE_NODES, "Number of nodes whose last request succeeded");
            metrics::describe_counter!(PROBE_FAILURES, "Total number of failed health probes");
        });
        Self
    }

    pub(crate) fn set_active_nodes(&self, active: usize) {
        gauge!(ACTIVE_NODES).set(active as f64);
    }

    pub(crate) fn probe_failed(&self, probe: &'static str) {
        counter!(PROBE_FAILURES, "probe" => probe).increment(1);
    }
}
