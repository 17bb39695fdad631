use blockmesh_interfaces::{node::NodeClient, RequestError, RequestResult};
use blockmesh_primitives::{Block, BlockNumber};
use parking_lot::RwLock;
use std::{
    future::Future,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::rpc::RpcClient;

/// Default upper bound for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Last observed health of a node.
///
/// Every field is unknown until the corresponding request has completed once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeHealth {
    /// `None` until the first request completes or fails.
    pub is_active: Option<bool>,
    /// Round trip of the last successful request.
    pub latency: Option<Duration>,
    /// Last reported chain height.
    pub block_height: Option<BlockNumber>,
    /// Last reported version string.
    pub user_agent: Option<String>,
    /// When the last probe was started.
    pub last_ping: Option<Instant>,
}

/// One RPC endpoint plus its health record.
///
/// Health fields are overwritten as a side effect of requests. Readers may observe values that
/// are one request old.
#[derive(Debug)]
pub struct NodeHandle {
    endpoint: String,
    client: Box<dyn NodeClient>,
    timeout: Duration,
    health: RwLock<NodeHealth>,
    pending_requests: AtomicUsize,
    is_benchmarking: AtomicBool,
    closed: AtomicBool,
}

impl NodeHandle {
    /// Wraps `client`, identified by `endpoint`.
    pub fn new(endpoint: impl Into<String>, client: impl NodeClient + 'static) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Box::new(client),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            health: RwLock::new(NodeHealth::default()),
            pending_requests: AtomicUsize::new(0),
            is_benchmarking: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a handle talking JSON-RPC over HTTP to `endpoint`.
    pub fn rpc(endpoint: impl Into<String>, timeout: Duration) -> RequestResult<Self> {
        let endpoint = endpoint.into();
        let client = RpcClient::new(&endpoint, timeout)?;
        Ok(Self::new(endpoint, client).with_timeout(timeout))
    }

    /// Sets the upper bound for a single request.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint this handle was created for.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Snapshot of the health record.
    pub fn health(&self) -> NodeHealth {
        self.health.read().clone()
    }

    /// `None` until the node has been probed once.
    pub fn is_active(&self) -> Option<bool> {
        self.health.read().is_active
    }

    /// Latency of the last successful request.
    pub fn latency(&self) -> Option<Duration> {
        self.health.read().latency
    }

    /// Last reported chain height.
    pub fn block_height(&self) -> Option<BlockNumber> {
        self.health.read().block_height
    }

    /// Last reported version string.
    pub fn user_agent(&self) -> Option<String> {
        self.health.read().user_agent.clone()
    }

    /// When the last probe was started.
    pub fn last_ping(&self) -> Option<Instant> {
        self.health.read().last_ping
    }

    /// Requests currently in flight against this node.
    pub fn pending_requests(&self) -> usize {
        self.pending_requests.load(Ordering::Relaxed)
    }

    /// Whether a probe is outstanding.
    pub fn is_benchmarking(&self) -> bool {
        self.is_benchmarking.load(Ordering::Relaxed)
    }

    /// Whether [`Self::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Fetches the chain height and records it.
    pub async fn get_block_count(&self) -> RequestResult<BlockNumber> {
        let height = self.request(self.client.block_height()).await?;
        self.health.write().block_height = Some(height);
        Ok(height)
    }

    /// Fetches the version string and records it as the user agent.
    pub async fn get_version(&self) -> RequestResult<String> {
        let user_agent = self.request(self.client.version()).await?;
        self.health.write().user_agent = Some(user_agent.clone());
        Ok(user_agent)
    }

    /// Fetches the block at `number`.
    pub async fn get_block(&self, number: BlockNumber) -> RequestResult<Block> {
        self.request(self.client.block(number)).await
    }

    /// Probes the node with a height request.
    ///
    /// Marks the node as benchmarking for the duration of the probe and stamps the probe time.
    pub async fn benchmark(&self) -> RequestResult<BlockNumber> {
        self.is_benchmarking.store(true, Ordering::Relaxed);
        self.health.write().last_ping = Some(Instant::now());
        let res = self.get_block_count().await;
        self.is_benchmarking.store(false, Ordering::Relaxed);
        res
    }

    /// Releases the transport. Further requests fail with [`RequestError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            debug!(target: "node", endpoint = %self.endpoint, "Closing node handle");
            self.client.close();
        }
    }

    /// Overwrites the health record.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_health(&self, health: NodeHealth) {
        *self.health.write() = health;
    }

    /// Overwrites the pending request count.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_pending_requests(&self, pending: usize) {
        self.pending_requests.store(pending, Ordering::Relaxed);
    }

    /// Overwrites the benchmarking flag.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_benchmarking(&self, benchmarking: bool) {
        self.is_benchmarking.store(benchmarking, Ordering::Relaxed);
    }

    /// Runs `fut` with the pending counter held and the timeout applied, then updates activity
    /// and latency.
    async fn request<T, F>(&self, fut: F) -> RequestResult<T>
    where
        F: Future<Output = RequestResult<T>>,
    {
        if self.is_closed() {
            return Err(RequestError::Closed)
        }

        let _pending = PendingGuard::new(&self.pending_requests);
        let started = Instant::now();
        let res = match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(RequestError::Timeout),
        };

        let mut health = self.health.write();
        match &res {
            Ok(_) => {
                let latency = started.elapsed();
                trace!(target: "node", endpoint = %self.endpoint, ?latency, "Request succeeded");
                health.is_active = Some(true);
                health.latency = Some(latency);
            }
            Err(err) => {
                debug!(target: "node", endpoint = %self.endpoint, %err, "Request failed");
                health.is_active = Some(false);
            }
        }
        res
    }
}

/// Holds one slot of a node's pending request count.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
