//! Sync configuration.

use crate::error::SyncResult;
use savesync_types::{DEFAULT_SYNC_FREQUENCY_MINUTES, ResolutionPolicy, sync_interval};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default bytes per upload chunk.
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 64 * 1024;

/// Configuration for the sync engine.
///
/// Deserializes from a partial camelCase document: missing options take
/// their defaults and unknown options are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Device name shown in the device roster.
    pub device_name: String,
    /// Run the periodic autosync timer.
    pub auto_sync: bool,
    /// Minutes between autosync attempts. Fractions are allowed; the value
    /// is clamped to between one minute and one week.
    pub sync_frequency_minutes: f64,
    /// Policy for conflicting fields.
    pub conflict_resolution: ResolutionPolicy,
    /// Request payload compression from the transport hook.
    pub compression: bool,
    /// Request payload encryption from the transport hook.
    pub encryption: bool,
    /// Retries per remote call for transient failures.
    pub max_retries: u32,
    /// Timeout per remote call (ms). Zero disables the timeout.
    pub timeout_ms: u64,
    /// First retry delay (ms); doubles per attempt.
    pub retry_backoff_ms: u64,
    /// Upload chunk size used for progress reporting.
    pub chunk_size_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_name: "Save Sync Device".to_string(),
            auto_sync: true,
            sync_frequency_minutes: DEFAULT_SYNC_FREQUENCY_MINUTES,
            conflict_resolution: ResolutionPolicy::Prompt,
            compression: false,
            encryption: false,
            max_retries: 3,
            timeout_ms: 30_000,
            retry_backoff_ms: 250,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
        }
    }
}

impl SyncConfig {
    /// Parses a (possibly partial) JSON configuration document.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Interval between autosync attempts. Never below one minute.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        sync_interval(self.sync_frequency_minutes)
    }

    /// Timeout applied to each remote call, `None` when `timeout_ms` is 0.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Delay before retry number `attempt` (1-based), capped at 10s.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor).min(10_000))
    }

    /// Upload chunk size, never zero.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size_bytes.max(1)
    }
}
