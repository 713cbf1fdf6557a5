//! Remote store abstraction.
//!
//! The engine talks to the authoritative copy of each user's snapshot
//! through [`RemoteClient`]. [`http::HttpRemoteClient`] speaks to a relay
//! over HTTP; [`mock::MemoryRemote`] keeps everything in memory for tests.

pub mod http;
pub mod mock;

use crate::error::SyncResult;
use async_trait::async_trait;
use savesync_types::{Snapshot, UserId};
use std::sync::Arc;

pub use http::{HttpRemoteClient, HttpRemoteConfig};

/// Receives upload progress as chunks leave the client.
pub trait UploadProgress: Send + Sync {
    /// `sent` bytes of `total` have been handed to the transport.
    fn on_chunk(&self, sent: u64, total: u64);
}

/// Progress sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl UploadProgress for NoProgress {
    fn on_chunk(&self, _sent: u64, _total: u64) {}
}

/// Access to the remote store holding one snapshot per user.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetches the user's snapshot. `Ok(None)` means the remote has none.
    async fn fetch_snapshot(&self, user_id: &UserId) -> SyncResult<Option<Snapshot>>;

    /// Replaces the user's snapshot, reporting progress per chunk.
    async fn put_snapshot(
        &self,
        user_id: &UserId,
        snapshot: &Snapshot,
        progress: Arc<dyn UploadProgress>,
    ) -> SyncResult<()>;
}

/// Supplies the bearer token attached to remote requests.
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` to send requests unauthenticated.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Byte-level hook applied to snapshot bodies on the wire.
///
/// Compression and encryption plug in here. `decode` must invert `encode`.
pub trait PayloadTransform: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn encode(&self, bytes: Vec<u8>) -> SyncResult<Vec<u8>>;

    fn decode(&self, bytes: Vec<u8>) -> SyncResult<Vec<u8>>;
}

/// Passes bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl PayloadTransform for IdentityTransform {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn encode(&self, bytes: Vec<u8>) -> SyncResult<Vec<u8>> {
        Ok(bytes)
    }

    fn decode(&self, bytes: Vec<u8>) -> SyncResult<Vec<u8>> {
        Ok(bytes)
    }
}

/// Splits `body` into `chunk_size` pieces for progress reporting.
pub(crate) fn chunked(body: Vec<u8>, chunk_size: usize) -> Vec<Vec<u8>> {
    body.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect()
}
