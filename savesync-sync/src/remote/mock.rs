//! In-memory remote store for tests, with failure injection.

use super::{RemoteClient, UploadProgress, chunked};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use savesync_types::{Snapshot, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

#[derive(Default)]
struct State {
    snapshots: HashMap<UserId, Snapshot>,
    fetch_failures: u32,
    put_failures: u32,
    put_status: Option<u16>,
    malformed: bool,
    fetches: usize,
    puts: usize,
}

/// A [`RemoteClient`] backed by a shared map. Clones share state.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
    gate: Arc<watch::Sender<bool>>,
    chunk_size: usize,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(State::default())),
            gate: Arc::new(gate),
            chunk_size: 256,
        }
    }

    /// Sets the chunk size used for upload progress.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seeds the remote copy for a user.
    pub fn set_snapshot(&self, snapshot: Snapshot) {
        self.state()
            .snapshots
            .insert(snapshot.user_id.clone(), snapshot);
    }

    /// Current remote copy for a user.
    pub fn snapshot(&self, user_id: &UserId) -> Option<Snapshot> {
        self.state().snapshots.get(user_id).cloned()
    }

    /// The next `n` fetches fail with a transient network error.
    pub fn fail_next_fetches(&self, n: u32) {
        self.state().fetch_failures = n;
    }

    /// The next `n` uploads fail with a transient network error.
    pub fn fail_next_puts(&self, n: u32) {
        self.state().put_failures = n;
    }

    /// Every upload fails with this HTTP status until cleared.
    pub fn fail_puts_with_status(&self, status: Option<u16>) {
        self.state().put_status = status;
    }

    /// Fetches return a protocol error as if the body were unparseable.
    pub fn set_malformed(&self, malformed: bool) {
        self.state().malformed = malformed;
    }

    /// Uploads wait until [`release_puts`](Self::release_puts).
    pub fn block_puts(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_puts(&self) {
        self.gate.send_replace(true);
    }

    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    pub fn put_count(&self) -> usize {
        self.state().puts
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    async fn fetch_snapshot(&self, user_id: &UserId) -> SyncResult<Option<Snapshot>> {
        let mut state = self.state();
        state.fetches += 1;
        if state.fetch_failures > 0 {
            state.fetch_failures -= 1;
            return Err(SyncError::Network("injected fetch failure".to_string()));
        }
        if state.malformed {
            return Err(SyncError::Protocol("malformed remote snapshot".to_string()));
        }
        Ok(state.snapshots.get(user_id).cloned())
    }

    async fn put_snapshot(
        &self,
        user_id: &UserId,
        snapshot: &Snapshot,
        progress: Arc<dyn UploadProgress>,
    ) -> SyncResult<()> {
        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| SyncError::ChannelClosed)?;

        {
            let mut state = self.state();
            state.puts += 1;
            if state.put_failures > 0 {
                state.put_failures -= 1;
                return Err(SyncError::Network("injected upload failure".to_string()));
            }
            if let Some(status) = state.put_status {
                return Err(SyncError::Remote {
                    status,
                    message: "injected upload failure".to_string(),
                });
            }
        }

        let body = snapshot.to_bytes()?;
        let total = body.len() as u64;
        let mut sent = 0u64;
        for piece in chunked(body, self.chunk_size) {
            sent += piece.len() as u64;
            progress.on_chunk(sent, total);
            tokio::task::yield_now().await;
        }

        self.state()
            .snapshots
            .insert(user_id.clone(), snapshot.clone());
        Ok(())
    }
}
