//! The sync engine.
//!
//! One call to [`SyncEngine::sync`] runs a full reconciliation for a user:
//!
//! 1. load the local replica (absent or corrupt means a fresh device)
//! 2. fetch the remote snapshot (failures count as "no remote")
//! 3. detect conflicts and resolve them per policy, or merge when clean
//! 4. upload the result, download it back as authoritative, persist locally
//!
//! At most one sync runs at a time. Non-forced calls made while another is
//! in flight return immediately; forced calls wait for it and then run.
//! Any failure marks the operation failed and leaves the local replica as
//! it was before the call.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::detector;
use crate::device::{
    CAPABILITY_CHUNKED_UPLOAD, CAPABILITY_COMPRESSION, CAPABILITY_ENCRYPTION, DeviceRegistry,
};
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::merger;
use crate::remote::{RemoteClient, UploadProgress};
use crate::resolver;
use crate::tracker::OperationTracker;
use savesync_storage::{KvStore, SnapshotStore, get_json, put_json};
use savesync_types::{
    Conflict, ConflictId, DeviceId, DeviceInfo, OperationId, OperationKind, Platform,
    Resolution, ResolutionPolicy, Snapshot, SyncOperation, SyncStatus, UserId,
    clamp_sync_frequency,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Key-value key holding the persisted [`SyncStatus`].
pub const STATUS_KEY: &str = "sync.status";

/// Error recorded on a parked operation replaced by a newer sync.
pub const SUPERSEDED_ERROR: &str = "superseded by a newer sync";

// Progress checkpoints (percent).
const LOADED: u8 = 10;
const FETCHED: u8 = 25;
const RESOLVED: u8 = 40;
const UPLOADED: u8 = 85;
const DOWNLOADED: u8 = 95;

/// How a sync call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote and local now hold the reconciled snapshot.
    Completed(OperationId),
    /// Another sync was in flight and `force` was not set.
    AlreadyInProgress,
    /// The device is offline; a failed operation was recorded.
    Offline(OperationId),
    /// Conflicts are parked until [`SyncEngine::resolve_conflicts`].
    AwaitingResolution(OperationId),
    /// The operation failed; local data is unchanged.
    Failed {
        operation_id: OperationId,
        error: String,
    },
}

impl SyncOutcome {
    /// Whether the call completed a sync.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The operation this call created or resumed, if any.
    #[must_use]
    pub fn operation_id(&self) -> Option<OperationId> {
        match self {
            Self::Completed(id) | Self::Offline(id) | Self::AwaitingResolution(id) => Some(*id),
            Self::Failed { operation_id, .. } => Some(*operation_id),
            Self::AlreadyInProgress => None,
        }
    }
}

/// A sync parked on user decisions.
struct Parked {
    user_id: UserId,
    local: Snapshot,
    remote: Option<Snapshot>,
    conflicts: Vec<Conflict>,
}

enum Step {
    Completed,
    Parked,
}

struct LocalReplica {
    snapshot: Snapshot,
    fresh: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raises an operation's progress and emits an event if it moved.
fn advance_tracked(
    tracker: &Mutex<OperationTracker>,
    events: &EventBus,
    operation_id: OperationId,
    percent: u8,
) {
    let moved = {
        let mut tracker = lock(tracker);
        let before = tracker.get(operation_id).map(|op| op.progress);
        tracker
            .advance(operation_id, percent)
            .ok()
            .filter(|after| Some(*after) != before)
    };
    if let Some(percent) = moved {
        events.emit(SyncEvent::Progress {
            operation_id,
            percent,
        });
    }
}

/// Maps upload chunks onto a slice of the operation's progress range.
struct OperationProgress {
    tracker: Arc<Mutex<OperationTracker>>,
    events: EventBus,
    operation_id: OperationId,
    from: u8,
    to: u8,
}

impl UploadProgress for OperationProgress {
    fn on_chunk(&self, sent: u64, total: u64) {
        let span = u64::from(self.to - self.from);
        let percent = match total {
            0 => self.to,
            _ => self.from + (span * sent.min(total) / total) as u8,
        };
        if let Err(e) = lock(&self.tracker).record_transfer(self.operation_id, sent, total) {
            debug!("[SYNC] Dropped transfer update: {}", e);
        }
        advance_tracked(&self.tracker, &self.events, self.operation_id, percent);
    }
}

fn initial_status(config: &SyncConfig) -> SyncStatus {
    SyncStatus {
        auto_sync_enabled: config.auto_sync,
        sync_frequency_minutes: clamp_sync_frequency(config.sync_frequency_minutes),
        ..SyncStatus::default()
    }
}

/// Restores the persisted status. Connectivity and the in-flight flag are
/// not restored; an unreadable record is replaced with defaults.
fn load_status(kv: &dyn KvStore, config: &SyncConfig) -> SyncStatus {
    match get_json::<SyncStatus>(kv, STATUS_KEY) {
        Ok(Some(mut status)) => {
            status.is_online = true;
            status.sync_in_progress = false;
            status.sync_frequency_minutes = clamp_sync_frequency(status.sync_frequency_minutes);
            status
        }
        Ok(None) => initial_status(config),
        Err(e) => {
            warn!("[SYNC] Persisted sync status is unreadable, resetting: {}", e);
            initial_status(config)
        }
    }
}

/// Reconciles a user's local replica with the remote store.
pub struct SyncEngine {
    config: SyncConfig,
    snapshots: Arc<dyn SnapshotStore>,
    kv: Arc<dyn KvStore>,
    remote: Arc<dyn RemoteClient>,
    clock: Arc<dyn Clock>,
    registry: DeviceRegistry,
    status: Mutex<SyncStatus>,
    tracker: Arc<Mutex<OperationTracker>>,
    parked: Mutex<HashMap<OperationId, Parked>>,
    /// Held for the duration of a sync.
    flight: tokio::sync::Mutex<()>,
    online: watch::Sender<bool>,
    events: EventBus,
}

impl SyncEngine {
    /// Creates an engine over a store that keeps both snapshots and records.
    pub fn new<S>(config: SyncConfig, store: Arc<S>, remote: Arc<dyn RemoteClient>) -> Self
    where
        S: SnapshotStore + KvStore + 'static,
    {
        Self::with_stores(config, store.clone(), store, remote)
    }

    /// Creates an engine over separate snapshot and record stores.
    pub fn with_stores(
        config: SyncConfig,
        snapshots: Arc<dyn SnapshotStore>,
        kv: Arc<dyn KvStore>,
        remote: Arc<dyn RemoteClient>,
    ) -> Self {
        let mut capabilities = vec![CAPABILITY_CHUNKED_UPLOAD.to_string()];
        if config.compression {
            capabilities.push(CAPABILITY_COMPRESSION.to_string());
        }
        if config.encryption {
            capabilities.push(CAPABILITY_ENCRYPTION.to_string());
        }
        let registry = DeviceRegistry::new(
            kv.clone(),
            config.device_name.clone(),
            Platform::current(),
            capabilities,
        );

        let status = load_status(kv.as_ref(), &config);
        let (online, _) = watch::channel(status.is_online);

        Self {
            config,
            snapshots,
            kv,
            remote,
            clock: Arc::new(SystemClock),
            registry,
            status: Mutex::new(status),
            tracker: Arc::new(Mutex::new(OperationTracker::new())),
            parked: Mutex::new(HashMap::new()),
            flight: tokio::sync::Mutex::new(()),
            online,
            events: EventBus::new(),
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> SyncStatus {
        lock(&self.status).clone()
    }

    /// All operations so far, oldest first.
    pub fn operations(&self) -> Vec<SyncOperation> {
        lock(&self.tracker).operations().to_vec()
    }

    pub fn operation(&self, operation_id: OperationId) -> Option<SyncOperation> {
        lock(&self.tracker).get(operation_id).cloned()
    }

    /// Operations of `user_id` waiting on [`resolve_conflicts`](Self::resolve_conflicts).
    pub fn awaiting_resolution(&self, user_id: &UserId) -> Vec<OperationId> {
        lock(&self.tracker).awaiting(user_id)
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Watches connectivity changes.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// This installation's device id.
    pub fn device_id(&self) -> SyncResult<DeviceId> {
        self.registry.current_device_id()
    }

    fn update_status<R>(&self, f: impl FnOnce(&mut SyncStatus) -> R) -> R {
        let mut status = lock(&self.status);
        let result = f(&mut status);
        if let Err(e) = put_json(self.kv.as_ref(), STATUS_KEY, &*status) {
            warn!("[SYNC] Failed to persist sync status: {}", e);
        }
        result
    }

    /// Upserts this device into the roster and refreshes its `last_seen`.
    pub fn register_device(&self, user_id: &UserId) -> SyncResult<DeviceInfo> {
        let now = self.clock.now();
        let info = self.update_status(|status| self.registry.register(status, now))?;
        debug!("[SYNC] Registered device {} for {}", info.id, user_id);
        Ok(info)
    }

    /// Records a connectivity change reported by the host.
    pub fn set_online(&self, online: bool) {
        let changed = self.update_status(|status| {
            let changed = status.is_online != online;
            status.is_online = online;
            changed
        });
        self.online.send_replace(online);
        if changed {
            info!("[SYNC] Connectivity changed: online={}", online);
            self.events.emit(SyncEvent::ConnectivityChanged { online });
        }
    }

    pub fn set_auto_sync(&self, enabled: bool) {
        self.update_status(|status| status.auto_sync_enabled = enabled);
    }

    /// Sets the autosync interval in minutes, clamped to one minute..one week.
    pub fn set_sync_frequency(&self, minutes: f64) {
        let minutes = clamp_sync_frequency(minutes);
        self.update_status(|status| status.sync_frequency_minutes = minutes);
    }

    /// Runs a sync and reports only whether it completed.
    pub async fn sync(&self, user_id: &UserId, force: bool) -> bool {
        self.sync_with_outcome(user_id, force).await.is_success()
    }

    /// Runs a sync for `user_id`.
    pub async fn sync_with_outcome(&self, user_id: &UserId, force: bool) -> SyncOutcome {
        let _flight = match self.flight.try_lock() {
            Ok(guard) => guard,
            Err(_) if force => {
                info!("[SYNC] Forced sync for {} waiting for the sync in flight", user_id);
                self.flight.lock().await
            }
            Err(_) => {
                debug!("[SYNC] Sync already in progress, skipping for {}", user_id);
                return SyncOutcome::AlreadyInProgress;
            }
        };

        if !self.is_online() {
            return self.record_offline(user_id);
        }

        self.supersede_parked(user_id);

        let operation_id = self.begin(user_id);

        match self.run(user_id, operation_id).await {
            Ok(Step::Completed) => SyncOutcome::Completed(operation_id),
            Ok(Step::Parked) => SyncOutcome::AwaitingResolution(operation_id),
            Err(e) => self.fail_operation(operation_id, user_id, &e),
        }
    }

    /// Finishes a parked sync with the user's per-conflict decisions.
    ///
    /// Conflicts without a decision keep their local value.
    pub async fn resolve_conflicts(
        &self,
        operation_id: OperationId,
        decisions: HashMap<ConflictId, Resolution>,
    ) -> SyncResult<SyncOutcome> {
        let _flight = self.flight.lock().await;

        let Some(parked) = lock(&self.parked).remove(&operation_id) else {
            return Err(match lock(&self.tracker).get(operation_id) {
                Some(_) => SyncError::NotAwaitingResolution(operation_id.to_string()),
                None => SyncError::OperationNotFound(operation_id.to_string()),
            });
        };

        if !self.is_online() {
            info!("[SYNC] Offline, keeping {} parked", operation_id);
            lock(&self.parked).insert(operation_id, parked);
            return Ok(SyncOutcome::Offline(operation_id));
        }

        lock(&self.tracker).resume(operation_id)?;
        self.update_status(|status| status.sync_in_progress = true);
        info!(
            "[SYNC] Resuming {} with {} decision(s) for {} conflict(s)",
            operation_id,
            decisions.len(),
            parked.conflicts.len()
        );

        let resolved = resolver::apply_decisions(
            &parked.local,
            parked.remote.as_ref(),
            &parked.conflicts,
            &decisions,
        );
        self.advance(operation_id, RESOLVED);

        match self
            .commit(&parked.user_id, operation_id, resolved.snapshot)
            .await
        {
            Ok(()) => Ok(SyncOutcome::Completed(operation_id)),
            Err(e) => Ok(self.fail_operation(operation_id, &parked.user_id, &e)),
        }
    }

    fn record_offline(&self, user_id: &UserId) -> SyncOutcome {
        let now = self.clock.now();
        let error = SyncError::Offline.to_string();
        let operation_id = lock(&self.tracker).record_failed(
            user_id.clone(),
            OperationKind::Upload,
            error.clone(),
            now,
        );
        info!("[SYNC] Offline, sync for {} not attempted", user_id);
        self.events.emit(SyncEvent::Failed {
            operation_id,
            user_id: user_id.clone(),
            error,
        });
        SyncOutcome::Offline(operation_id)
    }

    /// Fails any parked operation of `user_id`; a new sync replaces it.
    fn supersede_parked(&self, user_id: &UserId) {
        let superseded: Vec<OperationId> = {
            let mut parked = lock(&self.parked);
            let ids: Vec<OperationId> = parked
                .iter()
                .filter(|(_, p)| p.user_id == *user_id)
                .map(|(id, _)| *id)
                .collect();
            for id in &ids {
                parked.remove(id);
            }
            ids
        };

        for operation_id in superseded {
            let now = self.clock.now();
            if let Err(e) = lock(&self.tracker).fail(operation_id, SUPERSEDED_ERROR, now) {
                warn!("[SYNC] Could not supersede {}: {}", operation_id, e);
                continue;
            }
            info!("[SYNC] Parked sync {} superseded", operation_id);
            self.events.emit(SyncEvent::Failed {
                operation_id,
                user_id: user_id.clone(),
                error: SUPERSEDED_ERROR.to_string(),
            });
        }
    }

    fn begin(&self, user_id: &UserId) -> OperationId {
        let now = self.clock.now();
        let operation_id = lock(&self.tracker).begin(user_id.clone(), OperationKind::Upload, now);
        self.update_status(|status| status.sync_in_progress = true);
        info!("[SYNC] Sync {} started for {}", operation_id, user_id);
        self.events.emit(SyncEvent::Started {
            operation_id,
            user_id: user_id.clone(),
        });
        operation_id
    }

    fn advance(&self, operation_id: OperationId, percent: u8) {
        advance_tracked(&self.tracker, &self.events, operation_id, percent);
    }

    async fn run(&self, user_id: &UserId, operation_id: OperationId) -> SyncResult<Step> {
        self.register_device(user_id)?;

        let local = self.load_local(user_id).await?;
        self.advance(operation_id, LOADED);

        let remote = self.fetch_remote(user_id).await;
        self.advance(operation_id, FETCHED);

        let resolved = if local.fresh {
            match remote {
                Some(remote) => {
                    info!("[SYNC] No usable local data for {}, adopting remote", user_id);
                    remote
                }
                None => local.snapshot,
            }
        } else {
            let conflicts = detector::detect(&local.snapshot, remote.as_ref(), self.clock.now());
            if conflicts.is_empty() {
                merger::merge(&local.snapshot, remote.as_ref())
            } else {
                self.publish_conflicts(operation_id, &conflicts);
                let policy = self.config.conflict_resolution;
                if policy == ResolutionPolicy::Prompt {
                    self.park(operation_id, user_id, local.snapshot, remote, conflicts)?;
                    return Ok(Step::Parked);
                }
                let resolved =
                    resolver::resolve_recorded(&local.snapshot, remote.as_ref(), &conflicts, policy);
                info!(
                    "[SYNC] Resolved {} conflict(s) for {} with {} policy",
                    resolved.conflicts.len(),
                    user_id,
                    policy
                );
                resolved.snapshot
            }
        };
        self.advance(operation_id, RESOLVED);

        self.commit(user_id, operation_id, resolved).await?;
        Ok(Step::Completed)
    }

    async fn load_local(&self, user_id: &UserId) -> SyncResult<LocalReplica> {
        let store = self.snapshots.clone();
        let owner = user_id.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(&owner))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?;

        match loaded {
            Ok(Some(snapshot)) => Ok(LocalReplica {
                snapshot,
                fresh: false,
            }),
            Ok(None) => {
                debug!("[SYNC] No local snapshot for {}", user_id);
                self.default_replica(user_id)
            }
            Err(e) if e.is_corrupt() => {
                warn!("[SYNC] Local snapshot for {} is corrupt, starting from defaults: {}", user_id, e);
                self.default_replica(user_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn default_replica(&self, user_id: &UserId) -> SyncResult<LocalReplica> {
        Ok(LocalReplica {
            snapshot: Snapshot::new_default(
                user_id.clone(),
                self.registry.current_device_id()?,
                self.registry.platform(),
            ),
            fresh: true,
        })
    }

    async fn fetch_remote(&self, user_id: &UserId) -> Option<Snapshot> {
        match self
            .call_remote("fetch", || self.remote.fetch_snapshot(user_id))
            .await
        {
            Ok(Some(snapshot)) if snapshot.user_id == *user_id => Some(snapshot),
            Ok(Some(snapshot)) => {
                warn!(
                    "[SYNC] Remote returned a snapshot for {} instead of {}, ignoring it",
                    snapshot.user_id, user_id
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("[SYNC] Remote snapshot for {} unavailable, treating as absent: {}", user_id, e);
                None
            }
        }
    }

    fn publish_conflicts(&self, operation_id: OperationId, conflicts: &[Conflict]) {
        info!("[SYNC] {} conflict(s) detected in {}", conflicts.len(), operation_id);
        self.update_status(|status| status.conflicts = conflicts.to_vec());
        self.events.emit(SyncEvent::ConflictDetected {
            operation_id,
            conflicts: conflicts.to_vec(),
        });
    }

    fn park(
        &self,
        operation_id: OperationId,
        user_id: &UserId,
        local: Snapshot,
        remote: Option<Snapshot>,
        conflicts: Vec<Conflict>,
    ) -> SyncResult<()> {
        lock(&self.tracker).await_resolution(operation_id, conflicts.clone())?;
        lock(&self.parked).insert(
            operation_id,
            Parked {
                user_id: user_id.clone(),
                local,
                remote,
                conflicts: conflicts.clone(),
            },
        );
        self.update_status(|status| status.sync_in_progress = false);
        info!("[SYNC] Sync {} awaiting resolution", operation_id);
        self.events.emit(SyncEvent::AwaitingResolution {
            operation_id,
            conflicts,
        });
        Ok(())
    }

    /// Uploads `snapshot`, reads it back and stores the authoritative copy.
    async fn commit(
        &self,
        user_id: &UserId,
        operation_id: OperationId,
        mut snapshot: Snapshot,
    ) -> SyncResult<()> {
        let now = self.clock.now();
        snapshot.user_id = user_id.clone();
        snapshot.device_id = self.registry.current_device_id()?;
        snapshot.platform = self.registry.platform();
        snapshot.mark_synced(now);

        let progress: Arc<dyn UploadProgress> = Arc::new(OperationProgress {
            tracker: self.tracker.clone(),
            events: self.events.clone(),
            operation_id,
            from: RESOLVED,
            to: UPLOADED,
        });
        self.call_remote("upload", || {
            self.remote
                .put_snapshot(user_id, &snapshot, progress.clone())
        })
        .await?;
        self.advance(operation_id, UPLOADED);

        let mut authoritative = self
            .call_remote("download", || self.remote.fetch_snapshot(user_id))
            .await?
            .ok_or_else(|| SyncError::Protocol("remote has no snapshot after upload".to_string()))?;
        if let Some(synced_at) = snapshot.last_sync_at {
            authoritative.mark_synced(synced_at);
        }
        self.advance(operation_id, DOWNLOADED);

        let store = self.snapshots.clone();
        let owner = user_id.clone();
        tokio::task::spawn_blocking(move || store.save(&owner, &authoritative))
            .await
            .map_err(|e| SyncError::Task(e.to_string()))??;

        self.update_status(|status| {
            status.last_sync = Some(status.last_sync.map_or(now, |previous| previous.max(now)));
            status.conflicts.clear();
            status.sync_in_progress = false;
        });
        lock(&self.tracker).complete(operation_id, now)?;
        info!("[SYNC] Sync {} completed for {}", operation_id, user_id);
        self.events.emit(SyncEvent::Completed {
            operation_id,
            user_id: user_id.clone(),
        });
        Ok(())
    }

    fn fail_operation(
        &self,
        operation_id: OperationId,
        user_id: &UserId,
        error: &SyncError,
    ) -> SyncOutcome {
        let message = error.to_string();
        warn!("[SYNC] Sync {} for {} failed: {}", operation_id, user_id, message);
        let now = self.clock.now();
        if let Err(e) = lock(&self.tracker).fail(operation_id, message.clone(), now) {
            warn!("[SYNC] Could not mark {} failed: {}", operation_id, e);
        }
        self.update_status(|status| status.sync_in_progress = false);
        self.events.emit(SyncEvent::Failed {
            operation_id,
            user_id: user_id.clone(),
            error: message.clone(),
        });
        SyncOutcome::Failed {
            operation_id,
            error: message,
        }
    }

    /// Runs a remote call with the per-call timeout (if any), retrying transient
    /// failures up to `max_retries` times with exponential backoff.
    async fn call_remote<T, F, Fut>(&self, what: &str, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match self.config.timeout() {
                Some(limit) => tokio::time::timeout(limit, call())
                    .await
                    .unwrap_or(Err(SyncError::Timeout)),
                None => call().await,
            };
            match result {
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        "[SYNC] Remote {} failed ({}), retry {}/{} in {:?}",
                        what, e, attempt, self.config.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
