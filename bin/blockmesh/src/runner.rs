//! Entrypoint for running commands.

use blockmesh_tasks::shutdown::{signal, Shutdown};
use std::{future::Future, sync::mpsc, time::Duration};
use tokio::runtime::Runtime;
use tracing::{debug, error, trace};

/// Executes CLI commands on a tokio runtime owned by the runner.
#[derive(Debug)]
#[non_exhaustive]
pub struct CliRunner {
    tokio_runtime: Runtime,
}

impl CliRunner {
    /// Creates a runner on a multi-threaded runtime with all drivers enabled.
    pub fn try_default_runtime() -> Result<Self, std::io::Error> {
        Ok(Self { tokio_runtime: tokio_runtime()? })
    }

    /// Executes the given command until it resolves.
    ///
    /// The command receives a [`CliContext`] whose shutdown future resolves on `SIGINT` or
    /// `SIGTERM`. Commands are expected to wind down their components and return once it
    /// resolves.
    pub fn run_command_until_exit<F, E>(
        self,
        command: impl FnOnce(CliContext) -> F,
    ) -> Result<(), E>
    where
        F: Future<Output = Result<(), E>>,
        E: Send + Sync + 'static,
    {
        let (exit_signal, shutdown) = signal();
        let watcher = self.tokio_runtime.spawn(async move {
            match wait_for_exit_signal().await {
                Ok(()) => exit_signal.fire(),
                Err(err) => {
                    error!(target: "blockmesh::cli", %err, "Failed to install signal handlers");
                    // keep the signal alive, dropping it would shut the command down
                    std::future::pending::<()>().await;
                    drop(exit_signal);
                }
            }
        });

        let command_res = self.tokio_runtime.block_on(command(CliContext { shutdown }));
        watcher.abort();

        if command_res.is_err() {
            error!(target: "blockmesh::cli", "shutting down due to error");
        } else {
            debug!(target: "blockmesh::cli", "shutting down gracefully");
        }

        // dropping the runtime blocks until its pools are shut down, do that on a separate thread
        // and give up after 5 seconds
        let tokio_runtime = self.tokio_runtime;
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new().name("tokio-runtime-shutdown".to_string()).spawn(
            move || {
                drop(tokio_runtime);
                let _ = tx.send(());
            },
        );
        if spawned.is_ok() {
            let _ = rx.recv_timeout(Duration::from_secs(5)).inspect_err(|err| {
                debug!(target: "blockmesh::cli", %err, "tokio runtime shutdown timed out");
            });
        }

        command_res
    }
}

/// Additional context provided by the [`CliRunner`] when executing commands.
#[derive(Debug)]
pub struct CliContext {
    /// Resolves once the process was asked to exit.
    pub shutdown: Shutdown,
}

/// Creates a new default tokio multi-thread [Runtime] with all features enabled.
pub fn tokio_runtime() -> Result<Runtime, std::io::Error> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Resolves on `ctrl-c`, or `SIGTERM` on unix.
async fn wait_for_exit_signal() -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                trace!(target: "blockmesh::cli", "Received ctrl-c");
            },
            _ = sigterm.recv() => {
                trace!(target: "blockmesh::cli", "Received SIGTERM");
            },
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        trace!(target: "blockmesh::cli", "Received ctrl-c");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_command_result() {
        let runner = CliRunner::try_default_runtime().unwrap();
        let res: Result<(), std::io::Error> = runner.run_command_until_exit(|ctx| async move {
            assert!(!ctx.shutdown.is_terminated());
            Ok(())
        });
        assert!(res.is_ok());

        let runner = CliRunner::try_default_runtime().unwrap();
        let res: Result<(), eyre::Report> =
            runner.run_command_until_exit(|_| async { Err(eyre::eyre!("boom")) });
        assert_eq!(res.unwrap_err().to_string(), "boom");
    }
}
