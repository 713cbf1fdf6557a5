//! Durable local storage for save-state sync.
//!
//! Each device keeps exactly one snapshot per user plus a small key-value
//! area for engine metadata (device identity, sync status).
//!
//! # Architecture
//!
//! - [`SnapshotStore`] loads and saves the local replica for a user
//! - [`KvStore`] holds string-keyed JSON records for the engine
//! - [`SqliteStore`] implements both on a single SQLite file
//! - [`MemoryStore`] implements both in memory, for tests and ephemeral sessions
//!
//! Corrupt persisted records surface as [`StorageError::InvalidData`] so the
//! engine can recover with defaults instead of failing.

mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use savesync_types::{Snapshot, UserId};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Per-user local replica storage.
pub trait SnapshotStore: Send + Sync {
    /// Loads the snapshot for `user_id`, or `None` if this device has none.
    fn load(&self, user_id: &UserId) -> StorageResult<Option<Snapshot>>;

    /// Replaces the snapshot for `user_id`.
    fn save(&self, user_id: &UserId, snapshot: &Snapshot) -> StorageResult<()>;
}

/// String-keyed metadata storage.
pub trait KvStore: Send + Sync {
    /// Reads the raw value stored under `key`.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;
}

/// Reads and decodes a JSON record. Undecodable records are `InvalidData`.
pub fn get_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> StorageResult<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StorageError::InvalidData(format!("record {key}: {e}")))
}

/// Encodes and writes a JSON record.
pub fn put_json<T: Serialize>(store: &dyn KvStore, key: &str, value: &T) -> StorageResult<()> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}

pub(crate) fn decode_snapshot(user_id: &UserId, raw: &str) -> StorageResult<Snapshot> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::InvalidData(format!("corrupt snapshot for {user_id}: {e}")))
}
