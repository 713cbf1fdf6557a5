//! Cross-device save-state sync engine.
//!
//! Keeps a player's game data consistent across devices by reconciling the
//! local replica with a remote authoritative copy.
//!
//! # Architecture
//!
//! - **Detector**: structural diff producing per-path conflicts
//! - **Resolver**: applies a [`ResolutionPolicy`](savesync_types::ResolutionPolicy) to conflicts
//! - **Merger**: section-aware reconciliation when nothing conflicts
//! - **Remote**: the [`RemoteClient`] seam (HTTP relay or in-memory)
//! - **Engine**: the single-flight sync state machine
//! - **Scheduler**: periodic and reconnect-triggered autosync
//!
//! # Example
//!
//! ```no_run
//! use savesync_storage::SqliteStore;
//! use savesync_sync::{HttpRemoteClient, HttpRemoteConfig, SyncConfig, SyncEngine};
//! use savesync_types::UserId;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let store = Arc::new(SqliteStore::open("saves.db")?);
//! let remote = HttpRemoteClient::new(HttpRemoteConfig::from_sync_config(
//!     "http://127.0.0.1:4080",
//!     &config,
//! ))?;
//!
//! let engine = SyncEngine::new(config, store, Arc::new(remote));
//! let synced = engine.sync(&UserId::new("player-1"), false).await;
//! # let _ = synced;
//! # Ok(())
//! # }
//! ```

pub mod clock;
mod config;
pub mod detector;
pub mod device;
mod engine;
mod error;
mod events;
pub mod merger;
pub mod remote;
pub mod resolver;
mod scheduler;
pub mod tracker;
mod values;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_CHUNK_SIZE_BYTES, SyncConfig};
pub use device::DeviceRegistry;
pub use engine::{STATUS_KEY, SUPERSEDED_ERROR, SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use events::{EVENT_CHANNEL_CAPACITY, EventBus, SyncEvent};
pub use remote::{
    HttpRemoteClient, HttpRemoteConfig, IdentityTransform, NoProgress, PayloadTransform,
    RemoteClient, StaticToken, TokenProvider, UploadProgress,
};
pub use scheduler::{AutoSync, AutoSyncHandle};
pub use tracker::OperationTracker;
