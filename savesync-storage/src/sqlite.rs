//! SQLite-backed snapshot and metadata store.
//!
//! Uses one file per device: a `snapshots` table keyed by user id and a
//! `kv` table for engine metadata.

use crate::error::{StorageError, StorageResult};
use crate::{KvStore, SnapshotStore, decode_snapshot};
use rusqlite::{Connection, OptionalExtension, params};
use savesync_types::{Snapshot, UserId};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("Opened snapshot store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    fn init_schema(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshots (
                user_id TEXT PRIMARY KEY,
                device_id TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Overwrites the stored bytes for a user without validation.
    ///
    /// Lets tests and recovery tooling reproduce a corrupt replica.
    pub fn save_raw(&self, user_id: &UserId, raw: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (user_id, device_id, data, updated_at) VALUES (?1, '', ?2, ?3)",
            params![user_id.as_str(), raw, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Number of users with a stored snapshot.
    pub fn snapshot_count(&self) -> StorageResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl SnapshotStore for SqliteStore {
    fn load(&self, user_id: &UserId) -> StorageResult<Option<Snapshot>> {
        let raw: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT data FROM snapshots WHERE user_id = ?1",
                params![user_id.as_str()],
                |row| row.get(0),
            )
            .optional()?
        };
        raw.map(|raw| decode_snapshot(user_id, &raw)).transpose()
    }

    fn save(&self, user_id: &UserId, snapshot: &Snapshot) -> StorageResult<()> {
        let data = serde_json::to_string(snapshot)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO snapshots (user_id, device_id, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id.as_str(),
                snapshot.device_id.to_string(),
                data,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        debug!("Saved snapshot for {}", user_id);
        Ok(())
    }
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}
