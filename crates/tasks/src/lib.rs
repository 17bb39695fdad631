//! blockmesh task management.
//!
//! Components that run background work (health probes, queue top-ups, verification sweeps) spawn
//! it through a [`TaskSpawner`] and keep the returned handles, so that stopping the component
//! deterministically stops everything it started.

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/blockmesh/blockmesh/main/assets/blockmesh-docs.png",
    issue_tracker_base_url = "https://github.com/blockmesh/blockmesh/issues/"
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

use dyn_clone::DynClone;
use futures_util::{future::BoxFuture, FutureExt};
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tracing::error;

pub mod interval;
pub mod shutdown;

pub use interval::IntervalTask;

/// A type that can spawn tasks.
///
/// The main purpose of this type is to abstract over the runtime so it's more convenient to
/// provide default impls for testing.
///
/// # Examples
///
/// Use the [`TokioTaskExecutor`] that spawns with [`tokio::task::spawn`]
///
/// ```
/// # async fn t() {
/// use blockmesh_tasks::{TaskSpawner, TokioTaskExecutor};
/// let executor = TokioTaskExecutor::default();
///
/// let task = executor.spawn_task(Box::pin(async {
///     // -- snip --
/// }));
/// task.await.unwrap();
/// # }
/// ```
///
/// The [`TaskSpawner`] trait is [`DynClone`] so `Box<dyn TaskSpawner>` are also `Clone`.
#[auto_impl::auto_impl(&, Arc)]
pub trait TaskSpawner: Send + Sync + Unpin + std::fmt::Debug + DynClone {
    /// Spawns the task onto the runtime.
    /// See also [`tokio::runtime::Handle::spawn`].
    fn spawn_task(&self, fut: BoxFuture<'static, ()>) -> JoinHandle<()>;

    /// Spawns a task whose panic is logged under `name` instead of vanishing silently.
    fn spawn_critical_task(&self, name: &'static str, fut: BoxFuture<'static, ()>)
        -> JoinHandle<()>;
}

dyn_clone::clone_trait_object!(TaskSpawner);

/// An [`TaskSpawner`] that uses [`tokio::task::spawn`] to execute tasks
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct TokioTaskExecutor;

impl TokioTaskExecutor {
    /// Converts the instance to a boxed [`TaskSpawner`].
    pub fn boxed(self) -> Box<dyn TaskSpawner + 'static> {
        Box::new(self)
    }
}

impl TaskSpawner for TokioTaskExecutor {
    fn spawn_task(&self, fut: BoxFuture<'static, ()>) -> JoinHandle<()> {
        tokio::task::spawn(fut)
    }

    fn spawn_critical_task(
        &self,
        name: &'static str,
        fut: BoxFuture<'static, ()>,
    ) -> JoinHandle<()> {
        let task = AssertUnwindSafe(fut).catch_unwind().map(move |res| {
            if let Err(panic) = res {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(target: "tasks", task = name, %message, "Critical task panicked");
            }
        });
        tokio::task::spawn(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[test]
    fn test_cloneable() {
        #[derive(Clone)]
        struct ExecutorWrapper {
            _e: Box<dyn TaskSpawner>,
        }

        let executor: Box<dyn TaskSpawner> = Box::<TokioTaskExecutor>::default();
        let _e = dyn_clone::clone_box(&*executor);

        let e = ExecutorWrapper { _e };
        let _e2 = e;
    }

    #[tokio::test]
    async fn critical_task_panic_is_contained() {
        let executor = TokioTaskExecutor::default();
        let handle = executor.spawn_critical_task(
            "this is a critical task",
            Box::pin(async {
                panic!("intentionally panic");
            }),
        );
        // the panic is caught and logged, the join handle resolves normally
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn spawned_task_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        TokioTaskExecutor::default()
            .boxed()
            .spawn_task(Box::pin(async move { flag.store(true, Ordering::SeqCst) }))
            .await
            .unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
