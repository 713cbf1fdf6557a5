use savesync_storage::{
    KvStore, MemoryStore, SnapshotStore, SqliteStore, StorageError, get_json, put_json,
};
use savesync_types::{DeviceId, FieldPath, Platform, Snapshot, SyncStatus, UserId};
use serde_json::json;

fn make_snapshot(user: &str) -> Snapshot {
    Snapshot::new_default(UserId::new(user), DeviceId::new(), Platform::Linux)
}

fn stores() -> Vec<(&'static str, Box<dyn SnapshotStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

// ── SnapshotStore ────────────────────────────────────────────────

#[test]
fn load_missing_returns_none() {
    for (name, store) in stores() {
        assert!(
            store.load(&UserId::new("nobody")).unwrap().is_none(),
            "{name}"
        );
    }
}

#[test]
fn save_then_load_returns_same_snapshot() {
    for (name, store) in stores() {
        let user = UserId::new("u1");
        let snapshot = make_snapshot("u1");
        store.save(&user, &snapshot).unwrap();
        assert_eq!(store.load(&user).unwrap(), Some(snapshot), "{name}");
    }
}

#[test]
fn save_replaces_previous_snapshot() {
    for (name, store) in stores() {
        let user = UserId::new("u1");
        let mut snapshot = make_snapshot("u1");
        store.save(&user, &snapshot).unwrap();

        snapshot
            .payload
            .set_path(&FieldPath::new("progress.highScore"), json!(500));
        store.save(&user, &snapshot).unwrap();

        let loaded = store.load(&user).unwrap().unwrap();
        assert_eq!(
            loaded.payload.get_path(&"progress.highScore".into()),
            Some(&json!(500)),
            "{name}"
        );
    }
}

#[test]
fn snapshots_are_isolated_per_user() {
    for (name, store) in stores() {
        store.save(&UserId::new("a"), &make_snapshot("a")).unwrap();
        assert!(store.load(&UserId::new("b")).unwrap().is_none(), "{name}");
    }
}

#[test]
fn corrupt_sqlite_snapshot_is_invalid_data() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = UserId::new("u1");
    store.save_raw(&user, "{ definitely not a snapshot").unwrap();

    let err = store.load(&user).unwrap_err();
    assert!(err.is_corrupt());
    assert!(matches!(err, StorageError::InvalidData(_)));
}

#[test]
fn corrupt_memory_snapshot_is_invalid_data() {
    let store = MemoryStore::new();
    let user = UserId::new("u1");
    store.save_raw(&user, "[]").unwrap();
    assert!(store.load(&user).unwrap_err().is_corrupt());
}

#[test]
fn memory_store_counts_saves() {
    let store = MemoryStore::new();
    let user = UserId::new("u1");
    store.save(&user, &make_snapshot("u1")).unwrap();
    store.save(&user, &make_snapshot("u1")).unwrap();
    assert_eq!(store.save_count(), 2);
}

// ── Persistence across reopen ────────────────────────────────────

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("saves.db");
    let user = UserId::new("u1");
    let snapshot = make_snapshot("u1");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.save(&user, &snapshot).unwrap();
        store.put("device_id", "abc").unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.load(&user).unwrap(), Some(snapshot));
    assert_eq!(reopened.get("device_id").unwrap().as_deref(), Some("abc"));
    assert_eq!(reopened.snapshot_count().unwrap(), 1);
}

// ── KvStore ──────────────────────────────────────────────────────

#[test]
fn kv_put_overwrites() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.put("k", "1").unwrap();
    store.put("k", "2").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
    assert!(store.get("missing").unwrap().is_none());
}

#[test]
fn json_record_roundtrip() {
    let store = MemoryStore::new();
    let status = SyncStatus {
        is_online: false,
        sync_frequency_minutes: 15.0,
        ..Default::default()
    };
    put_json(&store, "status", &status).unwrap();
    let loaded: SyncStatus = get_json(&store, "status").unwrap().unwrap();
    assert_eq!(loaded, status);
}

#[test]
fn json_record_corruption_is_invalid_data() {
    let store = MemoryStore::new();
    store.put("status", "{{{").unwrap();
    let err = get_json::<SyncStatus>(&store, "status").unwrap_err();
    assert!(err.is_corrupt());
    assert!(err.to_string().contains("status"));
}

#[test]
fn json_record_missing_is_none() {
    let store = MemoryStore::new();
    assert!(get_json::<SyncStatus>(&store, "status").unwrap().is_none());
}
