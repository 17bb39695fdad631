use crate::{error::MeshError, metrics::MeshMetrics, selection};
use blockmesh_config::MeshConfig;
use blockmesh_node::{NodeHandle, NodeHealth};
use blockmesh_primitives::BlockNumber;
use blockmesh_tasks::{IntervalTask, TaskSpawner, TokioTaskExecutor};
use blockmesh_tokio_util::{Readiness, ReadyListener};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace};

/// A fixed pool of nodes with background health tracking.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Debug, Clone)]
pub struct Mesh {
    inner: Arc<MeshInner>,
}

/// Health row of a single node, see [`Mesh::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// The node's endpoint.
    pub endpoint: String,
    /// Last observed health.
    pub health: NodeHealth,
    /// Requests in flight.
    pub pending_requests: usize,
    /// Whether a probe is outstanding.
    pub is_benchmarking: bool,
}

#[derive(Debug)]
struct MeshInner {
    nodes: Vec<Arc<NodeHandle>>,
    config: MeshConfig,
    readiness: Readiness,
    /// Set while probing is running.
    timers: Mutex<Option<BenchmarkTimers>>,
    spawner: Box<dyn TaskSpawner>,
    metrics: MeshMetrics,
}

/// The periodic probe tasks. Dropping them stops them.
#[derive(Debug)]
struct BenchmarkTimers {
    _benchmark: IntervalTask,
    _missing_user_agent: Option<IntervalTask>,
    _refresh_user_agent: Option<IntervalTask>,
}

// === impl Mesh ===

impl Mesh {
    /// Creates a mesh over `nodes`, spawning its background work on the current tokio runtime.
    ///
    /// Probing starts right away if `start_benchmark_on_init` is set.
    pub fn new(nodes: Vec<NodeHandle>, config: MeshConfig) -> Result<Self, MeshError> {
        Self::with_spawner(nodes, config, TokioTaskExecutor::default().boxed())
    }

    /// Same as [`Mesh::new`] with a custom spawner.
    pub fn with_spawner(
        nodes: Vec<NodeHandle>,
        config: MeshConfig,
        spawner: Box<dyn TaskSpawner>,
    ) -> Result<Self, MeshError> {
        if nodes.is_empty() {
            return Err(MeshError::NoNodes)
        }
        config.validate()?;

        let mesh = Self {
            inner: Arc::new(MeshInner {
                nodes: nodes.into_iter().map(Arc::new).collect(),
                config,
                readiness: Readiness::new(),
                timers: Mutex::new(None),
                spawner,
                metrics: MeshMetrics::new(),
            }),
        };
        if config.start_benchmark_on_init {
            mesh.start_benchmark();
        }
        Ok(mesh)
    }

    /// The configuration the mesh runs with.
    pub fn config(&self) -> &MeshConfig {
        &self.inner.config
    }

    /// All nodes, in construction order.
    pub fn nodes(&self) -> &[Arc<NodeHandle>] {
        &self.inner.nodes
    }

    /// Starts probing. Does nothing if probing is already running.
    ///
    /// Every node whose activity is unknown gets one immediate height probe and, if enabled, one
    /// immediate version probe.
    pub fn start_benchmark(&self) {
        let mut timers = self.inner.timers.lock();
        if timers.is_some() {
            return
        }
        info!(target: "mesh", nodes = self.inner.nodes.len(), "Starting node benchmark");

        for node in self.inner.nodes.iter().filter(|node| node.is_active().is_none()) {
            self.inner.spawn_height_probe(Arc::clone(node));
            if self.inner.config.fetch_user_agent {
                self.inner.spawn_version_probe(Arc::clone(node));
            }
        }

        let config = &self.inner.config;
        let spawner = &*self.inner.spawner;
        let benchmark = periodic(
            spawner,
            "mesh::benchmark",
            config.benchmark_interval,
            &self.inner,
            MeshInner::benchmark_tick,
        );
        let (missing_user_agent, refresh_user_agent) = if config.fetch_user_agent {
            (
                Some(periodic(
                    spawner,
                    "mesh::missing-user-agent",
                    config.fetch_missing_user_agent_interval,
                    &self.inner,
                    MeshInner::missing_user_agent_tick,
                )),
                Some(periodic(
                    spawner,
                    "mesh::refresh-user-agent",
                    config.refresh_user_agent_interval,
                    &self.inner,
                    MeshInner::refresh_user_agent_tick,
                )),
            )
        } else {
            (None, None)
        };

        *timers = Some(BenchmarkTimers {
            _benchmark: benchmark,
            _missing_user_agent: missing_user_agent,
            _refresh_user_agent: refresh_user_agent,
        });
    }

    /// Stops probing. Does nothing if probing is not running.
    ///
    /// Probes that are already in flight complete and still update node health.
    pub fn stop_benchmark(&self) {
        if self.inner.timers.lock().take().is_some() {
            info!(target: "mesh", "Stopped node benchmark");
        }
    }

    /// Whether probing is running.
    pub fn is_benchmarking(&self) -> bool {
        self.inner.timers.lock().is_some()
    }

    /// Whether enough nodes have been active at once. Never reverts to false.
    pub fn is_ready(&self) -> bool {
        self.inner.readiness.is_ready()
    }

    /// Returns a listener that resolves once the mesh is ready.
    pub fn ready_listener(&self) -> ReadyListener {
        self.inner.readiness.listener()
    }

    /// Number of nodes whose last request succeeded.
    pub fn active_node_count(&self) -> usize {
        self.inner.active_node_count()
    }

    /// The active node with the lowest latency.
    pub fn fastest_node(&self) -> Option<Arc<NodeHandle>> {
        self.fastest_node_from(true)
    }

    /// The node with the lowest latency, among active nodes if `active_only` is set.
    pub fn fastest_node_from(&self, active_only: bool) -> Option<Arc<NodeHandle>> {
        selection::fastest(&self.inner.nodes, active_only)
    }

    /// The active node with the highest reported height.
    pub fn highest_node(&self) -> Option<Arc<NodeHandle>> {
        self.highest_node_from(true)
    }

    /// The node with the highest reported height, among active nodes if `active_only` is set.
    pub fn highest_node_from(&self, active_only: bool) -> Option<Arc<NodeHandle>> {
        selection::highest(&self.inner.nodes, active_only)
    }

    /// A random active node.
    pub fn random_node(&self) -> Option<Arc<NodeHandle>> {
        self.random_node_from(true)
    }

    /// A random node, among active nodes if `active_only` is set.
    pub fn random_node_from(&self, active_only: bool) -> Option<Arc<NodeHandle>> {
        selection::random(&self.inner.nodes, active_only)
    }

    /// The best active node to fetch block `height` from, see [`selection::optimal`].
    pub fn optimal_node(&self, height: BlockNumber) -> Option<Arc<NodeHandle>> {
        self.optimal_node_from(height, true)
    }

    /// The best node to fetch block `height` from, among active nodes if `active_only` is set.
    pub fn optimal_node_from(
        &self,
        height: BlockNumber,
        active_only: bool,
    ) -> Option<Arc<NodeHandle>> {
        selection::optimal(
            &self.inner.nodes,
            height,
            self.inner.config.pending_requests_threshold,
            active_only,
        )
    }

    /// The node the next periodic probe goes to, see [`selection::node_to_benchmark`].
    pub fn node_to_benchmark(&self) -> Option<Arc<NodeHandle>> {
        selection::node_to_benchmark(&self.inner.nodes)
    }

    /// Health rows for every node, in construction order.
    pub fn snapshot(&self) -> Vec<NodeStatus> {
        self.inner
            .nodes
            .iter()
            .map(|node| NodeStatus {
                endpoint: node.endpoint().to_string(),
                health: node.health(),
                pending_requests: node.pending_requests(),
                is_benchmarking: node.is_benchmarking(),
            })
            .collect()
    }

    /// Stops probing and closes every node.
    pub fn close(&self) {
        self.stop_benchmark();
        for node in &self.inner.nodes {
            node.close();
        }
        info!(target: "mesh", "Mesh closed");
    }
}

/// Spawns `tick` every `period` for as long as the mesh is alive.
fn periodic(
    spawner: &dyn TaskSpawner,
    name: &'static str,
    period: std::time::Duration,
    inner: &Arc<MeshInner>,
    tick: fn(&Arc<MeshInner>),
) -> IntervalTask {
    let weak: Weak<MeshInner> = Arc::downgrade(inner);
    IntervalTask::spawn(spawner, name, period, move || {
        if let Some(inner) = weak.upgrade() {
            tick(&inner);
        }
        std::future::ready(())
    })
}

// === impl MeshInner ===

impl MeshInner {
    fn active_node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_active() == Some(true)).count()
    }

    fn benchmark_tick(self: &Arc<Self>) {
        match selection::node_to_benchmark(&self.nodes) {
            Some(node) => self.spawn_height_probe(node),
            None => trace!(target: "mesh::benchmark", "Every node is being probed"),
        }
    }

    fn missing_user_agent_tick(self: &Arc<Self>) {
        for node in self.nodes.iter().filter(|node| node.user_agent().is_none()) {
            self.spawn_version_probe(Arc::clone(node));
        }
    }

    fn refresh_user_agent_tick(self: &Arc<Self>) {
        for node in &self.nodes {
            self.spawn_version_probe(Arc::clone(node));
        }
    }

    fn spawn_height_probe(self: &Arc<Self>, node: Arc<NodeHandle>) {
        let this = Arc::clone(self);
        self.spawner.spawn_task(Box::pin(async move {
            match node.benchmark().await {
                Ok(height) => {
                    trace!(
                        target: "mesh::benchmark",
                        endpoint = node.endpoint(),
                        height,
                        latency = ?node.latency(),
                        "Height probe succeeded"
                    );
                    this.on_probe_success();
                }
                Err(err) => {
                    debug!(
                        target: "mesh::benchmark",
                        endpoint = node.endpoint(),
                        %err,
                        "Height probe failed"
                    );
                    this.metrics.probe_failed("height");
                    this.metrics.set_active_nodes(this.active_node_count());
                }
            }
        }));
    }

    fn spawn_version_probe(self: &Arc<Self>, node: Arc<NodeHandle>) {
        let this = Arc::clone(self);
        self.spawner.spawn_task(Box::pin(async move {
            match node.get_version().await {
                Ok(user_agent) => {
                    trace!(
                        target: "mesh::benchmark",
                        endpoint = node.endpoint(),
                        %user_agent,
                        "Version probe succeeded"
                    );
                }
                Err(err) => {
                    debug!(
                        target: "mesh::benchmark",
                        endpoint = node.endpoint(),
                        %err,
                        "Version probe failed"
                    );
                    this.metrics.probe_failed("version");
                }
            }
        }));
    }

    /// Re-evaluates readiness after a successful height probe.
    fn on_probe_success(&self) {
        let active = self.active_node_count();
        self.metrics.set_active_nodes(active);
        if active >= self.config.min_active_nodes_required && self.readiness.mark_ready() {
            info!(target: "mesh", active, "Mesh is ready");
        }
    }
}
