use savesync_types::{ConflictId, DeviceId, OperationId, UserId};
use std::collections::HashSet;
use std::str::FromStr;

// ── DeviceId ──────────────────────────────────────────────────────

#[test]
fn device_id_new_is_unique() {
    let a = DeviceId::new();
    let b = DeviceId::new();
    assert_ne!(a, b);
}

#[test]
fn device_id_is_time_ordered() {
    let a = DeviceId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = DeviceId::new();
    assert!(a < b);
}

#[test]
fn device_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = DeviceId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn device_id_display_and_parse() {
    let id = DeviceId::new();
    let parsed = DeviceId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn device_id_parse_invalid() {
    assert!(DeviceId::parse("not-a-uuid").is_err());
    assert!(DeviceId::from_str("garbage").is_err());
}

#[test]
fn device_id_serializes_as_plain_string() {
    let id = DeviceId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let parsed: DeviceId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, parsed);
}

// ── OperationId / ConflictId ──────────────────────────────────────

#[test]
fn operation_id_hash_and_eq() {
    let id = OperationId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn conflict_id_default_is_unique() {
    let a = ConflictId::default();
    let b = ConflictId::default();
    assert_ne!(a, b);
}

#[test]
fn operation_id_debug_contains_type_name() {
    let debug = format!("{:?}", OperationId::new());
    assert!(debug.contains("OperationId"));
}

// ── UserId ────────────────────────────────────────────────────────

#[test]
fn user_id_display_matches_input() {
    let id = UserId::new("player-42");
    assert_eq!(id.to_string(), "player-42");
    assert_eq!(id.as_str(), "player-42");
}

#[test]
fn user_id_conversions_agree() {
    assert_eq!(UserId::from("a"), UserId::from("a".to_string()));
}

#[test]
fn user_id_serializes_transparently() {
    let json = serde_json::to_string(&UserId::new("u1")).unwrap();
    assert_eq!(json, "\"u1\"");
}
