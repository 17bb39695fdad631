//! Cancellable periodic tasks.

use crate::{
    shutdown::{signal, Signal},
    TaskSpawner,
};
use std::{future::Future, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::trace;

/// A periodic task owned by the component that started it.
///
/// The first tick fires one `period` after spawning. Ticks that overrun the period are delayed
/// rather than bursted. The task stops when [`IntervalTask::stop`] is called or the handle is
/// dropped; a tick that is already executing is allowed to finish.
#[derive(Debug)]
#[must_use = "the interval task is stopped when the handle is dropped"]
pub struct IntervalTask {
    name: &'static str,
    signal: Option<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl IntervalTask {
    /// Spawns `tick` to run every `period` on the given spawner.
    ///
    /// # Panics
    ///
    /// If `period` is zero.
    pub fn spawn<F, Fut>(
        spawner: &dyn TaskSpawner,
        name: &'static str,
        period: Duration,
        mut tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        assert!(!period.is_zero(), "interval period must be non-zero");
        let (signal, mut shutdown) = signal();

        let fut = async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = interval.tick() => tick().await,
                }
            }
            trace!(target: "tasks", name, "Interval task stopped");
        };

        let handle = spawner.spawn_critical_task(name, Box::pin(fut));
        Self { name, signal: Some(signal), handle: Some(handle) }
    }

    /// Name the task was spawned with.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }

    /// Stops the task and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(signal) = self.signal.take() {
            signal.fire();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for IntervalTask {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.fire();
        }
    }
}
