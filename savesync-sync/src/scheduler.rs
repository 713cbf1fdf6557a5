//! Background autosync.
//!
//! [`AutoSync::spawn`] runs a task that calls [`SyncEngine::sync`] every
//! `sync_frequency_minutes` and once more whenever connectivity comes back.
//! Both triggers are skipped while autosync is disabled in the status. The
//! interval is re-read after every attempt, so frequency changes apply from
//! the next tick.

use crate::engine::SyncEngine;
use savesync_types::UserId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Spawns autosync loops.
pub struct AutoSync;

/// Handle to a running autosync loop. Dropping it also stops the loop.
pub struct AutoSyncHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl AutoSyncHandle {
    /// Stops the loop and waits for an in-progress attempt to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl AutoSync {
    /// Starts autosync for `user_id` using the engine's status frequency.
    pub fn spawn(engine: Arc<SyncEngine>, user_id: UserId) -> AutoSyncHandle {
        Self::start(engine, user_id, None)
    }

    /// Starts autosync with a fixed period, ignoring the status frequency.
    pub fn spawn_with_period(
        engine: Arc<SyncEngine>,
        user_id: UserId,
        period: Duration,
    ) -> AutoSyncHandle {
        Self::start(engine, user_id, Some(period))
    }

    fn start(engine: Arc<SyncEngine>, user_id: UserId, fixed: Option<Duration>) -> AutoSyncHandle {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(run(engine, user_id, fixed, rx));
        AutoSyncHandle {
            shutdown: Some(tx),
            task,
        }
    }
}

fn period(engine: &SyncEngine, fixed: Option<Duration>) -> Duration {
    fixed.unwrap_or_else(|| engine.status().sync_interval())
}

async fn run(
    engine: Arc<SyncEngine>,
    user_id: UserId,
    fixed: Option<Duration>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut online = engine.connectivity();
    let mut was_online = *online.borrow_and_update();
    let mut deadline = Instant::now() + period(&engine, fixed);

    info!("[SYNC] Autosync started for {}", user_id);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            _ = tokio::time::sleep_until(deadline) => {
                if engine.status().auto_sync_enabled {
                    debug!("[SYNC] Autosync tick for {}", user_id);
                    engine.sync(&user_id, false).await;
                }
                deadline = Instant::now() + period(&engine, fixed);
            }

            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_online = *online.borrow_and_update();
                if now_online && !was_online && engine.status().auto_sync_enabled {
                    info!("[SYNC] Back online, syncing {}", user_id);
                    engine.sync(&user_id, false).await;
                }
                was_online = now_online;
            }
        }
    }

    info!("[SYNC] Autosync stopped for {}", user_id);
}
