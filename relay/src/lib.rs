//! HTTP API for the save sync relay.
//!
//! The relay holds the authoritative snapshot of every user in memory:
//!
//! - `GET /api/v1/info`: service name, version and snapshot count
//! - `GET /api/v1/snapshots/{user_id}`: 200 with the snapshot, 404 if none
//! - `PUT /api/v1/snapshots/{user_id}`: 204 on success, 400 if the body
//!   belongs to another user
//!
//! When started with a token, snapshot routes require
//! `Authorization: Bearer <token>` and answer 401 otherwise. Tokens are
//! compared in constant time.
//!
//! Upload bodies are capped at [`DEFAULT_MAX_SNAPSHOT_BYTES`] unless
//! [`RelayState::with_max_snapshot_bytes`] sets another limit; larger
//! uploads answer 413.

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use cmov::Cmov;
use savesync_types::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const SERVICE_NAME: &str = "savesync-relay";

/// Default cap on a single snapshot upload.
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub service: String,
    pub version: String,
    pub snapshots: usize,
    pub auth_required: bool,
}

/// Shared relay state.
#[derive(Debug)]
pub struct RelayState {
    snapshots: RwLock<HashMap<String, Snapshot>>,
    token: Option<String>,
    max_snapshot_bytes: usize,
}

impl RelayState {
    pub fn new(token: Option<String>) -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            token,
            max_snapshot_bytes: DEFAULT_MAX_SNAPSHOT_BYTES,
        }
    }

    /// Sets the largest accepted upload body.
    #[must_use]
    pub fn with_max_snapshot_bytes(mut self, bytes: usize) -> Self {
        self.max_snapshot_bytes = bytes;
        self
    }

    pub fn max_snapshot_bytes(&self) -> usize {
        self.max_snapshot_bytes
    }

    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn snapshot(&self, user_id: &str) -> Option<Snapshot> {
        self.snapshots.read().await.get(user_id).cloned()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        match presented {
            Some(token) if tokens_match(token.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }
}

/// Byte comparison whose timing does not depend on where the inputs differ.
/// Only the length check short-circuits.
fn tokens_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }

    let mut equal = 1u8;
    for (a, b) in presented.iter().zip(expected) {
        equal.cmovz(&0u8, u8::from(a == b));
    }
    equal != 0
}

async fn info_handler(State(state): State<Arc<RelayState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshots: state.snapshot_count().await,
        auth_required: state.token.is_some(),
    })
}

async fn get_snapshot(
    State(state): State<Arc<RelayState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Snapshot>, StatusCode> {
    state.authorize(&headers)?;
    match state.snapshot(&user_id).await {
        Some(snapshot) => {
            debug!("Served snapshot for {}", user_id);
            Ok(Json(snapshot))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn put_snapshot(
    State(state): State<Arc<RelayState>>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
    Json(snapshot): Json<Snapshot>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .authorize(&headers)
        .map_err(|status| (status, String::new()))?;

    if snapshot.user_id.as_str() != user_id {
        warn!(
            "Rejected snapshot for {} uploaded to {}",
            snapshot.user_id, user_id
        );
        return Err((
            StatusCode::BAD_REQUEST,
            format!("snapshot belongs to {}, not {}", snapshot.user_id, user_id),
        ));
    }

    info!(
        "Stored snapshot for {} from device {}",
        user_id, snapshot.device_id
    );
    state.snapshots.write().await.insert(user_id, snapshot);
    Ok(StatusCode::NO_CONTENT)
}

/// Build the HTTP API router over the given state.
pub fn build_router(state: Arc<RelayState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_snapshot_bytes);
    Router::new()
        .route("/api/v1/info", get(info_handler))
        .route(
            "/api/v1/snapshots/{user_id}",
            get(get_snapshot).put(put_snapshot),
        )
        .layer(body_limit)
        .with_state(state)
}
