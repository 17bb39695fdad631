//! Support for handling events emitted by the sync engine.

use blockmesh_interfaces::storage::BlockStorage;
use blockmesh_primitives::BlockNumber;
use blockmesh_sync::{SyncEngine, SyncEvent};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Interval of reporting sync state.
const INFO_MESSAGE_INTERVAL: Duration = Duration::from_secs(30);

/// Running totals since the command started.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct SyncState {
    stored: u64,
    skipped: u64,
    failed: u64,
    pruned: u64,
    /// Highest height stored so far.
    latest_stored: Option<BlockNumber>,
    /// Target height the last "reached" message was logged for.
    reached: Option<BlockNumber>,
}

impl SyncState {
    /// Processes an event emitted by the engine.
    fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::BlockStored { height, source } => {
                debug!(target: "blockmesh::cli", height, %source, "Block stored");
                self.stored += 1;
                self.latest_stored = self.latest_stored.max(Some(height));
            }
            SyncEvent::BlockSkipped { height, copies } => {
                debug!(target: "blockmesh::cli", height, copies, "Block already stored");
                self.skipped += 1;
            }
            SyncEvent::TaskFailed { .. } => self.failed += 1,
            SyncEvent::RetryScheduled { height, attempt } => {
                if attempt > 1 && attempt.is_power_of_two() {
                    warn!(target: "blockmesh::cli", height, attempt, "Block keeps failing");
                }
            }
            SyncEvent::Pruned { height, removed } => {
                info!(target: "blockmesh::cli", height, removed, "Pruned surplus copies");
                self.pruned += removed as u64;
            }
        }
    }

    /// Logs a status line, and once per target height that it was reached.
    fn report<S: BlockStorage + 'static>(&mut self, engine: &SyncEngine<S>) {
        let write_pointer = engine.write_pointer();
        let target = engine.target_height();
        let pending = engine.pending_tasks();
        let in_flight = engine.in_flight_tasks();

        info!(
            target: "blockmesh::cli",
            ?write_pointer,
            ?target,
            latest_stored = ?self.latest_stored,
            pending,
            in_flight,
            stored = self.stored,
            skipped = self.skipped,
            failed = self.failed,
            active_nodes = engine.mesh().active_node_count(),
            "Status"
        );

        if let Some(target) = target {
            let caught_up = write_pointer == Some(target) && pending == 0 && in_flight == 0;
            if caught_up && self.reached != Some(target) {
                self.reached = Some(target);
                info!(target: "blockmesh::cli", height = target, "Reached target height");
            }
        }
    }
}

/// Consumes engine events and periodically logs progress. Returns when the stream ends.
pub async fn handle_events<S, E>(engine: SyncEngine<S>, mut events: E)
where
    S: BlockStorage + 'static,
    E: Stream<Item = SyncEvent> + Unpin,
{
    let mut state = SyncState::default();
    let mut info_interval =
        interval_at(Instant::now() + INFO_MESSAGE_INTERVAL, INFO_MESSAGE_INTERVAL);
    info_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => state.handle_event(event),
                None => break,
            },
            _ = info_interval.tick() => state.report(&engine),
        }
    }
}
