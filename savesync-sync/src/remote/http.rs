//! HTTP client for the snapshot relay.
//!
//! Endpoints, relative to `base_url`:
//!
//! - `GET  /api/v1/snapshots/{userId}`: 200 with the snapshot, 404 if absent
//! - `PUT  /api/v1/snapshots/{userId}`: replaces the snapshot
//!
//! Uploads stream the body in chunks so progress can be reported.

use super::{
    IdentityTransform, PayloadTransform, RemoteClient, StaticToken, TokenProvider,
    UploadProgress, chunked,
};
use crate::config::{DEFAULT_CHUNK_SIZE_BYTES, SyncConfig};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode, header};
use savesync_types::{Snapshot, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for [`HttpRemoteClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRemoteConfig {
    /// Relay base URL, e.g. `http://127.0.0.1:4080`.
    pub base_url: String,
    /// Request timeout (ms). Zero disables the timeout.
    pub timeout_ms: u64,
    /// Upload chunk size.
    pub chunk_size_bytes: usize,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4080".to_string(),
            timeout_ms: 30_000,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
        }
    }
}

impl HttpRemoteConfig {
    /// Takes timeout and chunk size from the engine configuration.
    pub fn from_sync_config(base_url: impl Into<String>, config: &SyncConfig) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: config.timeout_ms,
            chunk_size_bytes: config.chunk_size(),
        }
    }
}

/// [`RemoteClient`] over HTTP.
pub struct HttpRemoteClient {
    config: HttpRemoteConfig,
    client: Client,
    tokens: Arc<dyn TokenProvider>,
    transform: Arc<dyn PayloadTransform>,
    has_transform: bool,
}

impl HttpRemoteClient {
    /// Creates a client with no token and the identity transform.
    pub fn new(config: HttpRemoteConfig) -> SyncResult<Self> {
        let mut builder = Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            tokens: Arc::new(StaticToken::none()),
            transform: Arc::new(IdentityTransform),
            has_transform: false,
        })
    }

    /// Attaches a bearer token source.
    #[must_use]
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Attaches a compression/encryption transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn PayloadTransform>) -> Self {
        self.transform = transform;
        self.has_transform = true;
        self
    }

    /// Logs a warning if `config` asks for compression or encryption but no
    /// transform is attached. Bodies are then sent as plain JSON.
    pub fn check_transform_hooks(&self, config: &SyncConfig) -> bool {
        let requested = config.compression || config.encryption;
        if requested && !self.has_transform {
            warn!(
                "compression={} encryption={} requested but no payload transform is attached; sending plain JSON",
                config.compression, config.encryption
            );
            return false;
        }
        true
    }

    /// URL of a user's snapshot resource.
    pub fn snapshot_url(&self, user_id: &UserId) -> String {
        format!(
            "{}/api/v1/snapshots/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(user_id.as_str())
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn transport_error(context: &str, e: &reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Timeout
    } else {
        SyncError::Network(format!("{context}: {e}"))
    }
}

async fn status_error(response: Response) -> SyncError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SyncError::Auth(format!("remote rejected credentials ({status})"))
        }
        _ => SyncError::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch_snapshot(&self, user_id: &UserId) -> SyncResult<Option<Snapshot>> {
        let url = self.snapshot_url(user_id);
        debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| transport_error("snapshot fetch failed", &e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error("snapshot body read failed", &e))?;
        let bytes = self.transform.decode(bytes.to_vec())?;
        let snapshot = Snapshot::from_slice(&bytes)
            .map_err(|e| SyncError::Protocol(format!("malformed remote snapshot: {e}")))?;

        if snapshot.user_id != *user_id {
            return Err(SyncError::Protocol(format!(
                "remote returned snapshot for {} instead of {}",
                snapshot.user_id, user_id
            )));
        }
        Ok(Some(snapshot))
    }

    async fn put_snapshot(
        &self,
        user_id: &UserId,
        snapshot: &Snapshot,
        progress: Arc<dyn UploadProgress>,
    ) -> SyncResult<()> {
        let url = self.snapshot_url(user_id);
        let body = self.transform.encode(snapshot.to_bytes()?)?;
        let total = body.len() as u64;
        debug!("PUT {} ({} bytes, {} transform)", url, total, self.transform.name());

        let mut sent = 0u64;
        let stream = futures::stream::iter(chunked(body, self.config.chunk_size_bytes).into_iter().map(
            move |piece| {
                sent += piece.len() as u64;
                progress.on_chunk(sent, total);
                Ok::<_, std::io::Error>(piece)
            },
        ));

        let response = self
            .authorize(self.client.put(&url))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| transport_error("snapshot upload failed", &e))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}
