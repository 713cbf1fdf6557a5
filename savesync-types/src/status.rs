//! Per-user sync status and the device roster.

use crate::conflict::Conflict;
use crate::ids::DeviceId;
use crate::snapshot::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default autosync interval.
pub const DEFAULT_SYNC_FREQUENCY_MINUTES: f64 = 5.0;

/// Autosync frequency bounds, in minutes.
pub const MIN_SYNC_FREQUENCY_MINUTES: f64 = 1.0;
pub const MAX_SYNC_FREQUENCY_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// Brings a configured frequency into range. Fractions are kept; NaN falls
/// back to the default.
#[must_use]
pub fn clamp_sync_frequency(minutes: f64) -> f64 {
    if minutes.is_nan() {
        return DEFAULT_SYNC_FREQUENCY_MINUTES;
    }
    minutes.clamp(MIN_SYNC_FREQUENCY_MINUTES, MAX_SYNC_FREQUENCY_MINUTES)
}

/// Autosync period for a frequency in (possibly fractional) minutes.
#[must_use]
pub fn sync_interval(minutes: f64) -> Duration {
    Duration::from_secs_f64(clamp_sync_frequency(minutes) * 60.0)
}

/// A device that has synced this user's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub platform: Platform,
    pub last_seen: DateTime<Utc>,
    /// True only for the device this process runs on.
    pub is_current: bool,
    pub capabilities: Vec<String>,
}

/// Sync state visible to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStatus {
    pub is_online: bool,
    pub last_sync: Option<DateTime<Utc>>,
    /// Memory-only guard; never restored as `true` from storage.
    #[serde(skip)]
    pub sync_in_progress: bool,
    pub conflicts: Vec<Conflict>,
    pub devices: Vec<DeviceInfo>,
    pub auto_sync_enabled: bool,
    pub sync_frequency_minutes: f64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            is_online: true,
            last_sync: None,
            sync_in_progress: false,
            conflicts: Vec::new(),
            devices: Vec::new(),
            auto_sync_enabled: true,
            sync_frequency_minutes: DEFAULT_SYNC_FREQUENCY_MINUTES,
        }
    }
}

impl SyncStatus {
    /// Current autosync period.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        sync_interval(self.sync_frequency_minutes)
    }

    /// Returns the roster entry flagged as the current device.
    #[must_use]
    pub fn current_device(&self) -> Option<&DeviceInfo> {
        self.devices.iter().find(|d| d.is_current)
    }

    /// Inserts or refreshes `device`, making it the only current entry.
    pub fn upsert_current_device(&mut self, device: DeviceInfo) {
        for existing in &mut self.devices {
            existing.is_current = false;
        }
        match self.devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device,
            None => self.devices.push(device),
        }
    }
}
