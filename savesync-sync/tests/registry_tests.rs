use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use savesync_storage::{KvStore, MemoryStore};
use savesync_sync::device::DEVICE_ID_KEY;
use savesync_sync::{DeviceRegistry, OperationTracker, SyncConfig, SyncError};
use savesync_types::{
    DeviceId, OperationKind, OperationStatus, Platform, ResolutionPolicy, SyncStatus, UserId,
};
use std::sync::Arc;
use std::time::Duration;

fn registry(store: Arc<MemoryStore>) -> DeviceRegistry {
    DeviceRegistry::new(store, "Deck", Platform::Linux, vec!["chunked-upload".to_string()])
}

// ── Device registry ─────────────────────────────────────────────

#[test]
fn device_id_is_generated_once_and_persisted() {
    let store = Arc::new(MemoryStore::new());
    let first = registry(store.clone()).current_device_id().unwrap();
    let second = registry(store.clone()).current_device_id().unwrap();

    assert_eq!(first, second);
    assert_eq!(store.get(DEVICE_ID_KEY).unwrap(), Some(first.to_string()));
}

#[test]
fn unreadable_device_id_is_replaced() {
    let store = Arc::new(MemoryStore::new());
    store.put(DEVICE_ID_KEY, "not-a-uuid").unwrap();

    let id = registry(store.clone()).current_device_id().unwrap();
    assert_eq!(store.get(DEVICE_ID_KEY).unwrap(), Some(id.to_string()));
}

#[test]
fn register_marks_only_this_device_current() {
    let store = Arc::new(MemoryStore::new());
    let registry = registry(store);
    let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();

    let mut status = SyncStatus::default();
    let mut other = registry.device_info(now).unwrap();
    other.id = DeviceId::new();
    other.name = "Phone".to_string();
    status.devices.push(other);

    let info = registry.register(&mut status, now).unwrap();

    assert_eq!(status.devices.len(), 2);
    assert_eq!(status.current_device(), Some(&info));
    assert_eq!(status.devices.iter().filter(|d| d.is_current).count(), 1);
    assert_eq!(info.platform, Platform::Linux);
}

// ── Operation tracker ───────────────────────────────────────────

#[test]
fn tracker_keeps_operations_in_order() {
    let now = Utc::now();
    let mut tracker = OperationTracker::new();
    let user = UserId::new("player-1");

    let a = tracker.begin(user.clone(), OperationKind::Upload, now);
    let b = tracker.record_failed(user.clone(), OperationKind::Download, "no connectivity", now);

    let ids: Vec<_> = tracker.operations().iter().map(|op| op.id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_eq!(tracker.get(a).unwrap().status, OperationStatus::InProgress);
    assert_eq!(tracker.get(b).unwrap().status, OperationStatus::Failed);
    assert_eq!(tracker.latest().unwrap().id, b);
}

#[test]
fn tracker_progress_is_monotonic() {
    let mut tracker = OperationTracker::new();
    let id = tracker.begin(UserId::new("p"), OperationKind::Upload, Utc::now());

    assert_eq!(tracker.advance(id, 40).unwrap(), 40);
    assert_eq!(tracker.advance(id, 10).unwrap(), 40);
    assert_eq!(tracker.advance(id, 250).unwrap(), 100);
}

#[test]
fn tracker_resume_requires_awaiting_status() {
    let mut tracker = OperationTracker::new();
    let user = UserId::new("p");
    let id = tracker.begin(user.clone(), OperationKind::Upload, Utc::now());

    assert!(matches!(tracker.resume(id), Err(SyncError::NotAwaitingResolution(_))));

    tracker.await_resolution(id, Vec::new()).unwrap();
    assert_eq!(tracker.awaiting(&user), vec![id]);
    assert_eq!(tracker.resume(id).unwrap(), user);
    assert!(tracker.awaiting(&user).is_empty());
}

#[test]
fn tracker_terminal_operations_stay_terminal() {
    let now = Utc::now();
    let mut tracker = OperationTracker::new();
    let id = tracker.begin(UserId::new("p"), OperationKind::Upload, now);

    tracker.complete(id, now).unwrap();
    assert!(matches!(tracker.fail(id, "late", now), Err(SyncError::State(_))));
    assert_eq!(tracker.get(id).unwrap().status, OperationStatus::Completed);
}

#[test]
fn tracker_unknown_operation_is_an_error() {
    let mut tracker = OperationTracker::new();
    let err = tracker.advance(savesync_types::OperationId::new(), 5).unwrap_err();
    assert!(matches!(err, SyncError::OperationNotFound(_)));
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn config_defaults() {
    let cfg = SyncConfig::default();
    assert!(cfg.auto_sync);
    assert_eq!(cfg.sync_frequency_minutes, 5.0);
    assert_eq!(cfg.conflict_resolution, ResolutionPolicy::Prompt);
    assert!(!cfg.compression);
    assert!(!cfg.encryption);
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn config_parses_partial_document() {
    let cfg = SyncConfig::from_json(
        r#"{"conflictResolution": "merge", "syncFrequencyMinutes": 0, "somethingElse": 1}"#,
    )
    .unwrap();
    assert_eq!(cfg.conflict_resolution, ResolutionPolicy::Merge);
    assert_eq!(cfg.sync_interval(), Duration::from_secs(60));
    assert_eq!(cfg.device_name, "Save Sync Device");
}

#[test]
fn config_accepts_fractional_frequency() {
    let cfg = SyncConfig::from_json(r#"{"syncFrequencyMinutes": 1.5}"#).unwrap();
    assert_eq!(cfg.sync_frequency_minutes, 1.5);
    assert_eq!(cfg.sync_interval(), Duration::from_secs(90));
}

#[test]
fn zero_timeout_disables_the_limit() {
    let cfg = SyncConfig::from_json(r#"{"timeoutMs": 0}"#).unwrap();
    assert_eq!(cfg.timeout(), None);

    let cfg = SyncConfig::from_json(r#"{"timeoutMs": 250}"#).unwrap();
    assert_eq!(cfg.timeout(), Some(Duration::from_millis(250)));
}

#[test]
fn config_rejects_unknown_policy() {
    assert!(SyncConfig::from_json(r#"{"conflictResolution": "newest"}"#).is_err());
}

#[test]
fn retry_delay_doubles_and_caps() {
    let cfg = SyncConfig {
        retry_backoff_ms: 100,
        ..Default::default()
    };
    assert_eq!(cfg.retry_delay(1), Duration::from_millis(100));
    assert_eq!(cfg.retry_delay(2), Duration::from_millis(200));
    assert_eq!(cfg.retry_delay(3), Duration::from_millis(400));
    assert_eq!(cfg.retry_delay(30), Duration::from_secs(10));
}
