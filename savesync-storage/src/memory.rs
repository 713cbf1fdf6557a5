//! In-memory store.

use crate::error::{StorageError, StorageResult};
use crate::{KvStore, SnapshotStore, decode_snapshot};
use savesync_types::{Snapshot, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Volatile store holding serialized records, so corrupt data can be
/// reproduced the same way as on disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: Arc<Mutex<HashMap<UserId, String>>>,
    kv: Arc<Mutex<HashMap<String, String>>>,
    save_count: Arc<Mutex<usize>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the stored bytes for a user without validation.
    pub fn save_raw(&self, user_id: &UserId, raw: impl Into<String>) -> StorageResult<()> {
        self.snapshots
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .insert(user_id.clone(), raw.into());
        Ok(())
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.save_count.lock().map(|count| *count).unwrap_or_default()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self, user_id: &UserId) -> StorageResult<Option<Snapshot>> {
        let raw = self
            .snapshots
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .get(user_id)
            .cloned();
        raw.map(|raw| decode_snapshot(user_id, &raw)).transpose()
    }

    fn save(&self, user_id: &UserId, snapshot: &Snapshot) -> StorageResult<()> {
        let raw = serde_json::to_string(snapshot)?;
        self.snapshots
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .insert(user_id.clone(), raw);
        *self.save_count.lock().map_err(|_| StorageError::Poisoned)? += 1;
        Ok(())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .kv
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .get(key)
            .cloned())
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.kv
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
