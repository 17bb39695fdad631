use crate::{
    error::{SyncError, SyncResult, SyncStage},
    event::SyncEvent,
    metrics::SyncMetrics,
    queue::{SyncTask, TaskQueue},
    verify::{next_window, SweepPlan, SweepReport},
};
use blockmesh_config::SyncConfig;
use blockmesh_interfaces::storage::BlockStorage;
use blockmesh_mesh::Mesh;
use blockmesh_primitives::{BlockMeta, BlockNumber, Priority};
use blockmesh_tasks::{
    shutdown::{signal, Shutdown, Signal},
    IntervalTask, TaskSpawner, TokioTaskExecutor,
};
use blockmesh_tokio_util::{EventSender, EventStream};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::{debug, info, trace, warn};

/// Drives height by height ingestion from the mesh into storage.
///
/// The engine is created idle. [`SyncEngine::start`] spawns the workers on first use, resumes
/// dequeuing and arms the top-up and verification timers. [`SyncEngine::stop`] pauses dequeuing
/// and cancels the timers, tasks already executing are allowed to finish. Cloning yields a handle
/// to the same engine.
#[derive(Debug)]
pub struct SyncEngine<S> {
    inner: Arc<EngineInner<S>>,
}

impl<S> Clone for SyncEngine<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

#[derive(Debug)]
struct EngineInner<S> {
    config: SyncConfig,
    mesh: Mesh,
    storage: S,
    state: Mutex<EngineState>,
    /// Wakes idle workers. Shared with the workers so that they don't keep the engine alive.
    notify: Arc<Notify>,
    events: EventSender<SyncEvent>,
    spawner: Box<dyn TaskSpawner>,
    metrics: SyncMetrics,
    /// Resolves once the engine is closed or dropped.
    shutdown: Shutdown,
    signal: Mutex<Option<Signal>>,
}

#[derive(Debug, Default)]
struct EngineState {
    queue: TaskQueue,
    /// Highest height ever enqueued, `None` until the start height is enqueued.
    write_pointer: Option<BlockNumber>,
    in_flight: HashMap<BlockNumber, usize>,
    in_flight_count: usize,
    awaiting_retry: HashSet<BlockNumber>,
    retries: HashMap<BlockNumber, u32>,
    running: bool,
    closed: bool,
    timers: Option<EngineTimers>,
    workers: Vec<JoinHandle<()>>,
    verify_cursor: Option<BlockNumber>,
}

#[derive(Debug)]
struct EngineTimers {
    _top_up: IntervalTask,
    _verification: Option<IntervalTask>,
}

/// Result of a task that did not fail.
enum StoreOutcome {
    Stored { source: String },
    Skipped { copies: usize },
}

/// A failed task and the node it was sent to, if any.
struct TaskFailure {
    endpoint: Option<String>,
    error: SyncError,
}

impl From<SyncError> for TaskFailure {
    fn from(error: SyncError) -> Self {
        Self { endpoint: None, error }
    }
}

// === impl SyncEngine ===

impl<S> SyncEngine<S>
where
    S: BlockStorage + 'static,
{
    /// Creates an idle engine that spawns its work on the current tokio runtime.
    pub fn new(config: SyncConfig, mesh: Mesh, storage: S) -> SyncResult<Self> {
        Self::with_spawner(config, mesh, storage, TokioTaskExecutor::default().boxed())
    }

    /// Same as [`SyncEngine::new`] with a custom spawner.
    pub fn with_spawner(
        config: SyncConfig,
        mesh: Mesh,
        storage: S,
        spawner: Box<dyn TaskSpawner>,
    ) -> SyncResult<Self> {
        config.validate()?;
        let (signal, shutdown) = signal();
        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                mesh,
                storage,
                state: Mutex::new(EngineState::default()),
                notify: Arc::new(Notify::new()),
                events: EventSender::default(),
                spawner,
                metrics: SyncMetrics::new(),
                shutdown,
                signal: Mutex::new(Some(signal)),
            }),
        })
    }

    /// The configuration the engine runs with.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// The mesh nodes are selected from.
    pub fn mesh(&self) -> &Mesh {
        &self.inner.mesh
    }

    /// The storage blocks are handed to.
    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    /// Starts or resumes syncing. Does nothing if the engine is running or closed.
    pub fn start(&self) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            if state.running {
                return
            }
            if state.closed {
                warn!(target: "sync::engine", "Refusing to start a closed engine");
                return
            }
            state.running = true;
            if state.workers.is_empty() {
                inner.spawn_workers(&mut state);
            }
            state.timers = Some(inner.spawn_timers());
        }
        info!(
            target: "sync::engine",
            workers = inner.config.worker_count,
            start = inner.config.start_block_index,
            target_height = ?inner.config.target_block_height,
            "Sync engine started"
        );
        inner.top_up();
        inner.notify.notify_waiters();
    }

    /// Pauses dequeuing and cancels the timers. Does nothing if the engine is not running.
    ///
    /// Tasks that are executing finish, queued tasks stay queued until the next start.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if !state.running {
            return
        }
        state.running = false;
        state.timers = None;
        info!(
            target: "sync::engine",
            pending = state.queue.len(),
            in_flight = state.in_flight_count,
            "Sync engine stopped"
        );
    }

    /// Stops the engine for good: abandons executing tasks and pending retries and waits for
    /// the workers to exit.
    pub async fn close(&self) {
        self.stop();
        let workers = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            std::mem::take(&mut state.workers)
        };
        if let Some(signal) = self.inner.signal.lock().take() {
            signal.fire();
        }
        for worker in workers {
            let _ = worker.await;
        }
        debug!(target: "sync::engine", "Sync engine closed");
    }

    /// Whether the engine is dequeuing.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Enqueues `height` at `priority`.
    ///
    /// With `safe` set the call does nothing while tasks are pending. The write pointer moves up
    /// to `height` if it is below it.
    pub fn enqueue_block(
        &self,
        height: BlockNumber,
        priority: Priority,
        safe: bool,
    ) -> SyncResult<()> {
        let start = self.inner.config.start_block_index;
        if height < start {
            return Err(SyncError::HeightBelowStart { height, start })
        }
        {
            let mut state = self.inner.state.lock();
            if safe && !state.queue.is_empty() {
                return Ok(())
            }
            self.inner.push(&mut state, SyncTask::new(height, priority));
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    /// Highest height ever enqueued.
    pub fn write_pointer(&self) -> Option<BlockNumber> {
        self.inner.state.lock().write_pointer
    }

    /// Number of tasks waiting for a worker.
    pub fn pending_tasks(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Number of tasks being executed.
    pub fn in_flight_tasks(&self) -> usize {
        self.inner.state.lock().in_flight_count
    }

    /// How many retries were scheduled for `height` since it was last stored.
    ///
    /// Resets to zero once the height is stored or found in storage.
    pub fn retry_count(&self, height: BlockNumber) -> u32 {
        self.inner.state.lock().retries.get(&height).copied().unwrap_or_default()
    }

    /// The height syncing stops at: the configured target, or the highest height reported by
    /// an active node.
    pub fn target_height(&self) -> Option<BlockNumber> {
        self.inner.target_height()
    }

    /// Subscribes to progress notifications.
    pub fn events(&self) -> EventStream<SyncEvent> {
        self.inner.events.new_listener()
    }

    /// Runs one verification sweep now.
    ///
    /// Returns `None` if nothing has been enqueued yet or storage could not be analyzed.
    pub async fn run_verification(&self) -> Option<SweepReport> {
        self.inner.verify().await
    }
}

// === impl EngineInner ===

impl<S> EngineInner<S>
where
    S: BlockStorage + 'static,
{
    fn target_height(&self) -> Option<BlockNumber> {
        self.config
            .target_block_height
            .or_else(|| self.mesh.highest_node().and_then(|node| node.block_height()))
    }

    /// The height following the write pointer.
    fn next_height(&self, state: &EngineState) -> Option<BlockNumber> {
        match state.write_pointer {
            Some(pointer) => pointer.checked_add(1),
            None => Some(self.config.start_block_index),
        }
    }

    /// Queues `task`, moving the write pointer up to its height.
    ///
    /// Only [`Self::refill`] and the verification sweep respect `max_queue_length`. Retries and
    /// explicit enqueues are pushed regardless, so the queue may exceed the bound until the
    /// workers drain it. A retry only returns a height a worker already took off the queue.
    fn push(&self, state: &mut EngineState, task: SyncTask) {
        if state.write_pointer.map_or(true, |pointer| task.height > pointer) {
            state.write_pointer = Some(task.height);
            self.metrics.set_write_pointer(task.height);
        }
        state.queue.push(task);
        self.metrics.set_queue(state.queue.len(), state.in_flight_count);
    }

    fn spawn_workers(self: &Arc<Self>, state: &mut EngineState) {
        for worker in 0..self.config.worker_count {
            let fut = run_worker(
                Arc::downgrade(self),
                Arc::clone(&self.notify),
                self.shutdown.clone(),
                worker,
            );
            state.workers.push(self.spawner.spawn_critical_task("sync::worker", Box::pin(fut)));
        }
    }

    fn spawn_timers(self: &Arc<Self>) -> EngineTimers {
        let weak = Arc::downgrade(self);
        let top_up = IntervalTask::spawn(
            &*self.spawner,
            "sync::top-up",
            self.config.top_up_interval,
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.top_up();
                }
                std::future::ready(())
            },
        );

        let verification = self.config.verification.enabled.then(|| {
            let weak = Arc::downgrade(self);
            IntervalTask::spawn(
                &*self.spawner,
                "sync::verify",
                self.config.verification.interval,
                move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.verify().await;
                        }
                    }
                },
            )
        });

        EngineTimers { _top_up: top_up, _verification: verification }
    }

    /// Enqueues the next height if the queue has drained and the target is not reached yet.
    fn top_up(&self) {
        let Some(target) = self.target_height() else {
            trace!(target: "sync::engine", "No target height known yet");
            return
        };
        {
            let mut state = self.state.lock();
            if !state.running || !state.queue.is_empty() {
                return
            }
            let Some(next) = self.next_height(&state).filter(|next| *next <= target) else {
                return
            };
            trace!(
                target: "sync::engine",
                height = next,
                target_height = target,
                "Topping up queue"
            );
            self.push(&mut state, SyncTask::new(next, Priority::CAUGHT_UP));
        }
        self.notify.notify_waiters();
    }

    /// Extends the queue with the heights following the write pointer.
    fn refill(&self) {
        let Some(target) = self.target_height() else { return };
        let mut enqueued = 0;
        {
            let mut state = self.state.lock();
            if !state.running {
                return
            }
            while state.queue.len() < self.config.max_queue_length {
                let Some(next) = self.next_height(&state).filter(|next| *next <= target) else {
                    break
                };
                self.push(&mut state, SyncTask::new(next, Priority::DEFAULT));
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            self.notify.notify_waiters();
        }
    }

    /// Dequeues the next task while the engine is running.
    fn next_task(&self) -> Option<SyncTask> {
        let mut state = self.state.lock();
        if !state.running {
            return None
        }
        let task = state.queue.pop()?;
        *state.in_flight.entry(task.height).or_default() += 1;
        state.in_flight_count += 1;
        self.metrics.set_queue(state.queue.len(), state.in_flight_count);
        Some(task)
    }

    fn finish_task(&self, height: BlockNumber) {
        let mut state = self.state.lock();
        if let Some(count) = state.in_flight.get_mut(&height) {
            *count -= 1;
            if *count == 0 {
                state.in_flight.remove(&height);
            }
        }
        state.in_flight_count = state.in_flight_count.saturating_sub(1);
        self.metrics.set_queue(state.queue.len(), state.in_flight_count);
    }

    /// Executes one task. Failures are converted into a delayed retry.
    async fn store_block(self: &Arc<Self>, task: SyncTask) {
        let height = task.height;
        match self.fetch_and_store(height).await {
            Ok(StoreOutcome::Stored { source }) => {
                trace!(target: "sync::engine", height, %source, "Stored block");
                self.metrics.block_stored();
                self.state.lock().retries.remove(&height);
                self.events.notify(SyncEvent::BlockStored { height, source });
                self.refill();
            }
            Ok(StoreOutcome::Skipped { copies }) => {
                trace!(target: "sync::engine", height, copies, "Block already stored");
                self.state.lock().retries.remove(&height);
                self.events.notify(SyncEvent::BlockSkipped { height, copies });
                self.refill();
            }
            Err(TaskFailure { endpoint, error }) => {
                let attempt = self.state.lock().retries.get(&height).copied().unwrap_or_default();
                warn!(
                    target: "sync::engine",
                    height,
                    endpoint = endpoint.as_deref().unwrap_or("none"),
                    attempt = attempt + 1,
                    %error,
                    "Failed to sync block"
                );
                self.metrics.task_failed(error.stage());
                self.events.notify(SyncEvent::TaskFailed { height, error });
                self.schedule_retry(height);
            }
        }
    }

    async fn fetch_and_store(&self, height: BlockNumber) -> Result<StoreOutcome, TaskFailure> {
        if self.config.check_redundancy_before_store {
            let copies =
                with_timeout(self.config.store_timeout, height, SyncStage::Store, async {
                    self.storage.count_redundancy(height).await.map_err(SyncError::Store)
                })
                .await?;
            if copies >= self.config.block_redundancy {
                return Ok(StoreOutcome::Skipped { copies })
            }
        }

        let node = self.mesh.optimal_node(height).ok_or(SyncError::NoNodeAvailable { height })?;
        let endpoint = node.endpoint().to_string();
        let with_endpoint = |error| TaskFailure { endpoint: Some(endpoint.clone()), error };

        let block = with_timeout(self.config.fetch_timeout, height, SyncStage::Fetch, async {
            node.get_block(height).await.map_err(SyncError::Fetch)
        })
        .await
        .map_err(with_endpoint)?;

        let meta = BlockMeta::from_source(endpoint.clone()).with_user_agent(node.user_agent());
        with_timeout(self.config.store_timeout, height, SyncStage::Store, async {
            self.storage.set_block(height, block, meta).await.map_err(SyncError::Store)
        })
        .await
        .map_err(with_endpoint)?;

        Ok(StoreOutcome::Stored { source: endpoint })
    }

    /// Enqueues `height` again in the retry lane once the retry delay has passed.
    fn schedule_retry(self: &Arc<Self>, height: BlockNumber) {
        let attempt = {
            let mut state = self.state.lock();
            state.awaiting_retry.insert(height);
            let attempt = state.retries.entry(height).or_default();
            *attempt += 1;
            *attempt
        };
        self.metrics.retry_scheduled();
        self.events.notify(SyncEvent::RetryScheduled { height, attempt });

        let weak = Arc::downgrade(self);
        let delay = self.config.retry_delay;
        let mut shutdown = self.shutdown.clone();
        self.spawner.spawn_task(Box::pin(async move {
            tokio::select! {
                biased;
                _ = &mut shutdown => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if let Some(inner) = weak.upgrade() {
                inner.requeue(height);
            }
        }));
    }

    fn requeue(&self, height: BlockNumber) {
        {
            let mut state = self.state.lock();
            state.awaiting_retry.remove(&height);
            self.push(&mut state, SyncTask::new(height, Priority::RETRY));
        }
        debug!(target: "sync::engine", height, "Retrying block");
        self.notify.notify_waiters();
    }

    /// Analyzes the next window of synced heights, re-enqueues missing heights and prunes
    /// surplus copies.
    async fn verify(&self) -> Option<SweepReport> {
        let range = {
            let mut state = self.state.lock();
            let pointer = state.write_pointer?;
            let (range, cursor) = next_window(
                self.config.start_block_index,
                pointer,
                state.verify_cursor,
                self.config.verification.max_heights_per_sweep,
            );
            state.verify_cursor = cursor;
            range
        };

        let histogram = match tokio::time::timeout(
            self.config.store_timeout,
            self.storage.analyze_height_range(range.clone()),
        )
        .await
        {
            Ok(Ok(histogram)) => histogram,
            Ok(Err(err)) => {
                warn!(target: "sync::verify", ?range, %err, "Failed to analyze stored heights");
                return None
            }
            Err(_) => {
                warn!(target: "sync::verify", ?range, "Analyzing stored heights timed out");
                return None
            }
        };
        let plan = SweepPlan::new(&histogram, self.config.block_redundancy);

        let requeued = {
            let mut state = self.state.lock();
            let free = self.config.max_queue_length.saturating_sub(state.queue.len());
            let requeued = plan
                .missing
                .iter()
                .copied()
                .filter(|height| {
                    !state.queue.contains(*height) &&
                        !state.in_flight.contains_key(height) &&
                        !state.awaiting_retry.contains(height)
                })
                .take(free)
                .collect::<Vec<_>>();
            for height in &requeued {
                self.push(&mut state, SyncTask::new(*height, Priority::VERIFY));
            }
            requeued
        };
        if !requeued.is_empty() {
            self.notify.notify_waiters();
        }

        let mut pruned = Vec::new();
        if self.config.prune_redundant_blocks {
            for height in plan.redundant {
                let keep = self.config.block_redundancy;
                match tokio::time::timeout(
                    self.config.store_timeout,
                    self.storage.prune_block(height, keep),
                )
                .await
                {
                    Ok(Ok(0)) => {}
                    Ok(Ok(removed)) => {
                        self.events.notify(SyncEvent::Pruned { height, removed });
                        pruned.push((height, removed));
                    }
                    Ok(Err(err)) => {
                        warn!(target: "sync::verify", height, %err, "Failed to prune block")
                    }
                    Err(_) => warn!(target: "sync::verify", height, "Pruning block timed out"),
                }
            }
        }

        debug!(
            target: "sync::verify",
            ?range,
            missing = plan.missing.len(),
            requeued = requeued.len(),
            pruned = pruned.len(),
            "Verification sweep finished"
        );
        Some(SweepReport { range, missing: plan.missing, requeued, pruned })
    }
}

/// Bounds `fut` by `timeout`, converting expiry into [`SyncError::Timeout`].
async fn with_timeout<T, F>(
    timeout: Duration,
    height: BlockNumber,
    stage: SyncStage,
    fut: F,
) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(SyncError::Timeout { height, stage }))
}

/// Worker loop: dequeue, execute, repeat.
///
/// Holds the engine only while executing a task, so that dropping every engine handle shuts the
/// workers down.
async fn run_worker<S>(
    inner: Weak<EngineInner<S>>,
    notify: Arc<Notify>,
    mut shutdown: Shutdown,
    worker: usize,
) where
    S: BlockStorage + 'static,
{
    trace!(target: "sync::engine", worker, "Worker started");
    loop {
        let notified = notify.notified();
        tokio::pin!(notified);
        // register before checking the queue so a concurrent enqueue is not missed
        notified.as_mut().enable();

        let next = {
            let Some(this) = inner.upgrade() else { break };
            this.next_task().map(|task| (this, task))
        };

        match next {
            Some((this, task)) => {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = this.store_block(task) => {}
                }
                this.finish_task(task.height);
            }
            None => {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = notified => {}
                }
            }
        }
    }
    trace!(target: "sync::engine", worker, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use blockmesh_config::{MeshConfig, VerificationConfig};
    use blockmesh_interfaces::test_utils::{test_block, TestNodeClient};
    use blockmesh_node::NodeHandle;
    use blockmesh_storage::MemoryStorage;
    use tokio_stream::StreamExt;

    fn idle_mesh() -> Mesh {
        Mesh::new(
            vec![NodeHandle::new("node", TestNodeClient::new(10))],
            MeshConfig { start_benchmark_on_init: false, ..Default::default() },
        )
        .unwrap()
    }

    fn idle_engine(config: SyncConfig) -> SyncEngine<Arc<MemoryStorage>> {
        SyncEngine::new(config, idle_mesh(), Arc::new(MemoryStorage::new())).unwrap()
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let config = SyncConfig { worker_count: 0, ..Default::default() };
        let err = SyncEngine::new(config, idle_mesh(), Arc::new(MemoryStorage::new())).unwrap_err();
        assert_matches!(err, SyncError::InvalidConfig(_));
    }

    #[tokio::test]
    async fn enqueue_below_start_fails() {
        let engine = idle_engine(SyncConfig { start_block_index: 10, ..Default::default() });
        assert_eq!(
            engine.enqueue_block(9, Priority::DEFAULT, false),
            Err(SyncError::HeightBelowStart { height: 9, start: 10 })
        );
        assert_eq!(engine.write_pointer(), None);
        assert_eq!(engine.pending_tasks(), 0);

        engine.enqueue_block(10, Priority::DEFAULT, false).unwrap();
        assert_eq!(engine.write_pointer(), Some(10));
    }

    #[tokio::test]
    async fn write_pointer_never_decreases() {
        let engine = idle_engine(SyncConfig::default());
        engine.enqueue_block(7, Priority::DEFAULT, false).unwrap();
        engine.enqueue_block(3, Priority::RETRY, false).unwrap();
        assert_eq!(engine.write_pointer(), Some(7));
        assert_eq!(engine.pending_tasks(), 2);

        engine.enqueue_block(8, Priority::DEFAULT, false).unwrap();
        assert_eq!(engine.write_pointer(), Some(8));
    }

    #[tokio::test]
    async fn safe_enqueue_only_fills_an_empty_queue() {
        let engine = idle_engine(SyncConfig::default());
        engine.enqueue_block(0, Priority::DEFAULT, true).unwrap();
        assert_eq!(engine.pending_tasks(), 1);

        engine.enqueue_block(1, Priority::DEFAULT, true).unwrap();
        assert_eq!(engine.pending_tasks(), 1);
        assert_eq!(engine.write_pointer(), Some(0));
    }

    #[tokio::test]
    async fn explicit_enqueues_and_retries_may_exceed_queue_bound() {
        let engine = idle_engine(SyncConfig { max_queue_length: 2, ..Default::default() });
        for height in 0..3 {
            engine.enqueue_block(height, Priority::DEFAULT, false).unwrap();
        }
        assert_eq!(engine.pending_tasks(), 3);

        engine.inner.requeue(1);
        assert_eq!(engine.pending_tasks(), 4);
        assert_eq!(engine.write_pointer(), Some(2));
    }

    #[tokio::test]
    async fn idle_engine_does_not_dequeue() {
        let engine = idle_engine(SyncConfig::default());
        engine.enqueue_block(0, Priority::DEFAULT, false).unwrap();
        assert!(!engine.is_running());
        assert!(engine.inner.next_task().is_none());
        assert_eq!(engine.pending_tasks(), 1);
    }

    #[tokio::test]
    async fn verification_requeues_missing_and_prunes_surplus() {
        let storage = Arc::new(MemoryStorage::new());
        for (height, copies) in [(0, 1), (1, 3), (3, 1)] {
            for _ in 0..copies {
                storage.set_block(height, test_block(height), BlockMeta::default()).await.unwrap();
            }
        }
        let config = SyncConfig {
            verification: VerificationConfig { enabled: false, ..Default::default() },
            ..Default::default()
        };
        let engine = SyncEngine::new(config, idle_mesh(), Arc::clone(&storage)).unwrap();
        let mut events = engine.events();

        assert!(engine.run_verification().await.is_none());

        engine.enqueue_block(3, Priority::DEFAULT, false).unwrap();
        let report = engine.run_verification().await.unwrap();
        assert_eq!(report.range, 0..=3);
        assert_eq!(report.missing, vec![2]);
        assert_eq!(report.requeued, vec![2]);
        assert_eq!(report.pruned, vec![(1, 2)]);
        assert_eq!(storage.copies(1).len(), 1);
        assert_eq!(engine.pending_tasks(), 2);

        assert_eq!(events.next().await, Some(SyncEvent::Pruned { height: 1, removed: 2 }));

        // already queued, not enqueued twice
        let report = engine.run_verification().await.unwrap();
        assert_eq!(report.missing, vec![2]);
        assert!(report.requeued.is_empty());
        assert!(report.pruned.is_empty());
    }

    #[tokio::test]
    async fn verification_keeps_copies_when_pruning_is_disabled() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_block(0, test_block(0), BlockMeta::default()).await.unwrap();
        storage.set_block(0, test_block(0), BlockMeta::default()).await.unwrap();
        let config = SyncConfig { prune_redundant_blocks: false, ..Default::default() };
        let engine = SyncEngine::new(config, idle_mesh(), Arc::clone(&storage)).unwrap();

        engine.enqueue_block(0, Priority::DEFAULT, false).unwrap();
        let report = engine.run_verification().await.unwrap();
        assert!(report.pruned.is_empty());
        assert_eq!(storage.copies(0).len(), 2);
    }

    #[tokio::test]
    async fn closed_engine_cannot_start() {
        let engine = idle_engine(SyncConfig { worker_count: 2, ..Default::default() });
        engine.start();
        assert!(engine.is_running());
        engine.close().await;
        assert!(!engine.is_running());

        engine.start();
        assert!(!engine.is_running());
    }
}
