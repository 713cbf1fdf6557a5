//! Core type definitions for save-state synchronization.
//!
//! This crate defines the data model shared by the storage layer, the sync
//! engine and the reference relay:
//! - Device, operation and conflict identifiers (UUID v7)
//! - Snapshots and their generic payload tree
//! - Field-level conflicts and resolution policies
//! - Tracked sync operations and the per-user sync status
//!
//! Game-domain data (pets, farms, trades) rides inside the payload as opaque
//! sub-trees and has no types here.

mod conflict;
mod ids;
mod operation;
pub mod path;
mod snapshot;
mod status;

pub use conflict::{Conflict, Resolution, ResolutionPolicy};
pub use ids::{ConflictId, DeviceId, OperationId, UserId};
pub use operation::{OperationKind, OperationStatus, SyncOperation};
pub use path::FieldPath;
pub use snapshot::{Payload, Platform, SCHEMA_VERSION, Snapshot, section};
pub use status::{
    DEFAULT_SYNC_FREQUENCY_MINUTES, DeviceInfo, MAX_SYNC_FREQUENCY_MINUTES,
    MIN_SYNC_FREQUENCY_MINUTES, SyncStatus, clamp_sync_frequency, sync_interval,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown resolution policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid operation transition: {from} -> {to}")]
    InvalidTransition {
        from: OperationStatus,
        to: OperationStatus,
    },
}
