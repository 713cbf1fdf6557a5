use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use savesync_types::{
    DeviceId, FieldPath, Payload, Platform, SCHEMA_VERSION, Snapshot, UserId, section,
};
use serde_json::json;

fn default_snapshot() -> Snapshot {
    Snapshot::new_default(UserId::new("u1"), DeviceId::new(), Platform::Linux)
}

// ── Default construction ──────────────────────────────────────────

#[test]
fn default_snapshot_has_every_section() {
    let snapshot = default_snapshot();
    for name in section::ALL {
        assert!(
            snapshot.payload.section(name).is_some(),
            "missing section {name}"
        );
    }
    assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
    assert!(snapshot.last_sync_at.is_none());
}

#[test]
fn default_progress_counters_start_at_zero() {
    let snapshot = default_snapshot();
    for counter in ["totalScore", "highScore", "gamesPlayed", "gamesWon"] {
        let path = FieldPath::new(section::PROGRESS).child(counter);
        assert_eq!(snapshot.payload.get_path(&path), Some(&json!(0)));
    }
}

#[test]
fn default_achievements_are_empty_array() {
    let snapshot = default_snapshot();
    assert_eq!(
        snapshot.payload.section(section::ACHIEVEMENTS),
        Some(&json!([]))
    );
}

// ── Field paths ───────────────────────────────────────────────────

#[test]
fn get_path_walks_nested_objects() {
    let snapshot = default_snapshot();
    let path = FieldPath::new("settings.musicVolume");
    assert_eq!(snapshot.payload.get_path(&path), Some(&json!(0.8)));
}

#[test]
fn get_path_missing_returns_none() {
    let snapshot = default_snapshot();
    assert!(snapshot.payload.get_path(&"settings.nope".into()).is_none());
    assert!(snapshot.payload.get_path(&"nope".into()).is_none());
    assert!(snapshot.payload.get_path(&"".into()).is_none());
}

#[test]
fn set_path_creates_intermediate_objects() {
    let mut payload = Payload::new();
    payload.set_path(&"gameState.pets.dog.name".into(), json!("Rex"));
    assert_eq!(
        payload.section("gameState"),
        Some(&json!({"pets": {"dog": {"name": "Rex"}}}))
    );
}

#[test]
fn set_path_overwrites_leaf() {
    let mut snapshot = default_snapshot();
    let path = FieldPath::new("progress.highScore");
    snapshot.payload.set_path(&path, json!(900));
    assert_eq!(snapshot.payload.get_path(&path), Some(&json!(900)));
}

#[test]
fn field_path_root_is_first_segment() {
    assert_eq!(FieldPath::new("progress.highScore").root(), Some("progress"));
    assert_eq!(FieldPath::new("").root(), None);
}

// ── Sync timestamp ────────────────────────────────────────────────

#[test]
fn mark_synced_never_moves_backwards() {
    let mut snapshot = default_snapshot();
    let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    snapshot.mark_synced(t1);
    assert_eq!(snapshot.last_sync_at, Some(t1));

    snapshot.mark_synced(t1 - Duration::minutes(5));
    assert_eq!(snapshot.last_sync_at, Some(t1));

    let t2 = t1 + Duration::minutes(5);
    snapshot.mark_synced(t2);
    assert_eq!(snapshot.last_sync_at, Some(t2));
}

// ── Wire format ───────────────────────────────────────────────────

#[test]
fn snapshot_uses_camel_case_keys() {
    let snapshot = default_snapshot();
    let value = serde_json::to_value(&snapshot).unwrap();
    assert!(value.get("userId").is_some());
    assert!(value.get("deviceId").is_some());
    assert!(value.get("schemaVersion").is_some());
    assert_eq!(value["platform"], json!("linux"));
    assert!(value["payload"].get("gameState").is_some());
}

#[test]
fn snapshot_bytes_roundtrip() {
    let snapshot = default_snapshot();
    let bytes = snapshot.to_bytes().unwrap();
    assert_eq!(Snapshot::from_slice(&bytes).unwrap(), snapshot);
}

#[test]
fn snapshot_missing_last_sync_defaults_to_none() {
    let device = DeviceId::new();
    let raw = json!({
        "userId": "u1",
        "deviceId": device.to_string(),
        "platform": "web",
        "schemaVersion": 1,
        "payload": {"progress": {"highScore": 3}}
    });
    let snapshot: Snapshot = serde_json::from_value(raw).unwrap();
    assert_eq!(snapshot.platform, Platform::Web);
    assert!(snapshot.last_sync_at.is_none());
}

#[test]
fn malformed_snapshot_is_an_error() {
    assert!(Snapshot::from_slice(b"{\"userId\": 3}").is_err());
    assert!(Snapshot::from_slice(b"not json").is_err());
}
