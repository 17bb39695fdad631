//! Testing support for node related interfaces.
use crate::{
    error::{RequestError, RequestResult},
    node::NodeClient,
};
use blockmesh_primitives::{Block, BlockNumber};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

/// Deterministic payload served by [`TestNodeClient`] for `number`.
pub fn test_block(number: BlockNumber) -> Block {
    Block::from(format!("block-{number}").into_bytes())
}

/// A scripted [`NodeClient`].
///
/// Serves [`test_block`] payloads up to its configured height. Individual heights can be made to
/// fail a number of times or to never answer, and the whole client can be taken offline.
#[derive(Debug)]
pub struct TestNodeClient {
    state: Mutex<State>,
    height_requests: AtomicUsize,
    version_requests: AtomicUsize,
    block_requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Debug)]
struct State {
    height: BlockNumber,
    online: bool,
    version: String,
    delay: Duration,
    failures: HashMap<BlockNumber, usize>,
    hanging: HashSet<BlockNumber>,
    served: HashMap<BlockNumber, usize>,
}

impl Default for TestNodeClient {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TestNodeClient {
    /// Creates an online client that serves blocks up to `height`.
    pub fn new(height: BlockNumber) -> Self {
        Self {
            state: Mutex::new(State {
                height,
                online: true,
                version: "/test-node:1.0.0/".to_string(),
                delay: Duration::ZERO,
                failures: HashMap::new(),
                hanging: HashSet::new(),
                served: HashMap::new(),
            }),
            height_requests: AtomicUsize::new(0),
            version_requests: AtomicUsize::new(0),
            block_requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Creates a client that fails every request.
    pub fn offline() -> Self {
        let client = Self::new(0);
        client.set_online(false);
        client
    }

    /// Sets the version string.
    pub fn with_version(self, version: impl Into<String>) -> Self {
        self.state.lock().version = version.into();
        self
    }

    /// Delays every response by `delay`.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = delay;
        self
    }

    /// Changes the reported height.
    pub fn set_height(&self, height: BlockNumber) {
        self.state.lock().height = height;
    }

    /// Takes the client on or offline.
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Makes the next `times` requests for `number` fail with a transport error.
    pub fn fail_block(&self, number: BlockNumber, times: usize) {
        self.state.lock().failures.insert(number, times);
    }

    /// Requests for `number` never complete.
    pub fn hang_block(&self, number: BlockNumber) {
        self.state.lock().hanging.insert(number);
    }

    /// Number of height requests received.
    pub fn height_requests(&self) -> usize {
        self.height_requests.load(Ordering::SeqCst)
    }

    /// Number of version requests received.
    pub fn version_requests(&self) -> usize {
        self.version_requests.load(Ordering::SeqCst)
    }

    /// Number of block requests received.
    pub fn block_requests(&self) -> usize {
        self.block_requests.load(Ordering::SeqCst)
    }

    /// Number of successful responses for `number`.
    pub fn served(&self, number: BlockNumber) -> usize {
        self.state.lock().served.get(&number).copied().unwrap_or_default()
    }

    /// Highest number of block requests that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn delay(&self) -> Duration {
        self.state.lock().delay
    }

    fn ensure_online(&self) -> RequestResult<()> {
        if self.state.lock().online {
            Ok(())
        } else {
            Err(RequestError::Transport("connection refused".to_string()))
        }
    }
}

/// Decrements the in-flight counter on drop.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl NodeClient for TestNodeClient {
    async fn block_height(&self) -> RequestResult<BlockNumber> {
        self.height_requests.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay()).await;
        self.ensure_online()?;
        Ok(self.state.lock().height)
    }

    async fn version(&self) -> RequestResult<String> {
        self.version_requests.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay()).await;
        self.ensure_online()?;
        Ok(self.state.lock().version.clone())
    }

    async fn block(&self, number: BlockNumber) -> RequestResult<Block> {
        self.block_requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        tokio::time::sleep(self.delay()).await;
        let hanging = self.state.lock().hanging.contains(&number);
        if hanging {
            std::future::pending::<()>().await;
        }
        self.ensure_online()?;

        let mut state = self.state.lock();
        if let Some(remaining) = state.failures.get_mut(&number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RequestError::Transport(format!("scripted failure for block {number}")))
            }
        }
        if number > state.height {
            return Err(RequestError::BadResponse(format!("unknown block {number}")))
        }
        *state.served.entry(number).or_default() += 1;
        Ok(test_block(number))
    }
}
