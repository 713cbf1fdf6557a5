//! Device identity and roster registration.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use savesync_storage::KvStore;
use savesync_types::{DeviceId, DeviceInfo, Platform, SyncStatus};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Key-value key holding this installation's device id.
pub const DEVICE_ID_KEY: &str = "device.id";

/// Capability advertised by every device.
pub const CAPABILITY_CHUNKED_UPLOAD: &str = "chunked-upload";
pub const CAPABILITY_COMPRESSION: &str = "compression";
pub const CAPABILITY_ENCRYPTION: &str = "encryption";

/// Owns the stable id of the device this process runs on.
pub struct DeviceRegistry {
    kv: Arc<dyn KvStore>,
    name: String,
    platform: Platform,
    capabilities: Vec<String>,
    cached: Mutex<Option<DeviceId>>,
}

impl DeviceRegistry {
    pub fn new(
        kv: Arc<dyn KvStore>,
        name: impl Into<String>,
        platform: Platform,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            kv,
            name: name.into(),
            platform,
            capabilities,
            cached: Mutex::new(None),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the persisted device id, generating and storing one on first use.
    ///
    /// An unreadable stored id is replaced with a fresh one.
    pub fn current_device_id(&self) -> SyncResult<DeviceId> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = *cached {
            return Ok(id);
        }

        let stored = self.kv.get(DEVICE_ID_KEY)?;
        let id = match stored.as_deref().map(DeviceId::parse) {
            Some(Ok(id)) => id,
            Some(Err(e)) => {
                warn!("Stored device id is unreadable ({}), generating a new one", e);
                self.generate()?
            }
            None => self.generate()?,
        };

        *cached = Some(id);
        Ok(id)
    }

    fn generate(&self) -> SyncResult<DeviceId> {
        let id = DeviceId::new();
        self.kv.put(DEVICE_ID_KEY, &id.to_string())?;
        info!("Generated device id {}", id);
        Ok(id)
    }

    /// Roster entry for this device, seen at `now`.
    pub fn device_info(&self, now: DateTime<Utc>) -> SyncResult<DeviceInfo> {
        Ok(DeviceInfo {
            id: self.current_device_id()?,
            name: self.name.clone(),
            platform: self.platform,
            last_seen: now,
            is_current: true,
            capabilities: self.capabilities.clone(),
        })
    }

    /// Upserts this device into `status.devices`.
    pub fn register(&self, status: &mut SyncStatus, now: DateTime<Utc>) -> SyncResult<DeviceInfo> {
        let info = self.device_info(now)?;
        status.upsert_current_device(info.clone());
        Ok(info)
    }
}
