//! Snapshots: the unit of synchronization.

use crate::ids::{DeviceId, UserId};
use crate::path::{self, FieldPath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Current snapshot schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Names of the well-known payload sub-documents.
pub mod section {
    pub const GAME_STATE: &str = "gameState";
    pub const USER_PROFILE: &str = "userProfile";
    pub const ACHIEVEMENTS: &str = "achievements";
    pub const SETTINGS: &str = "settings";
    pub const PROGRESS: &str = "progress";
    pub const INVENTORY: &str = "inventory";
    pub const SOCIAL: &str = "social";

    /// All sub-documents, in canonical order.
    pub const ALL: [&str; 7] = [
        GAME_STATE,
        USER_PROFILE,
        ACHIEVEMENTS,
        SETTINGS,
        PROGRESS,
        INVENTORY,
        SOCIAL,
    ];
}

/// Platform a device runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Windows,
    Macos,
    Linux,
    Ios,
    Android,
    #[default]
    Unknown,
}

impl Platform {
    /// The platform this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "macos" => Self::Macos,
            "linux" => Self::Linux,
            "ios" => Self::Ios,
            "android" => Self::Android,
            _ if cfg!(target_family = "wasm") => Self::Web,
            _ => Self::Unknown,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The synchronized data tree: named sub-documents of scalar and nested fields.
///
/// The engine treats the payload generically; only the merger knows the
/// semantics of a few well-known sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// The payload a brand-new player starts with.
    #[must_use]
    pub fn initial() -> Self {
        let mut map = Map::new();
        map.insert(
            section::GAME_STATE.into(),
            json!({
                "level": 1,
                "experience": 0,
                "currentWorld": "meadow",
                "unlockedWorlds": ["meadow"],
                "tutorialCompleted": false
            }),
        );
        map.insert(
            section::USER_PROFILE.into(),
            json!({
                "displayName": "",
                "avatar": null,
                "bio": "",
                "language": "en",
                "timezone": "UTC"
            }),
        );
        map.insert(section::ACHIEVEMENTS.into(), json!([]));
        map.insert(
            section::SETTINGS.into(),
            json!({
                "soundEnabled": true,
                "musicVolume": 0.8,
                "effectsVolume": 0.8,
                "notificationsEnabled": true,
                "theme": "system",
                "graphicsQuality": "medium"
            }),
        );
        map.insert(
            section::PROGRESS.into(),
            json!({
                "totalScore": 0,
                "highScore": 0,
                "gamesPlayed": 0,
                "gamesWon": 0,
                "currentStreak": 0,
                "playTimeSeconds": 0
            }),
        );
        map.insert(
            section::INVENTORY.into(),
            json!({
                "coins": 0,
                "gems": 0,
                "items": []
            }),
        );
        map.insert(
            section::SOCIAL.into(),
            json!({
                "friends": [],
                "blocked": [],
                "pendingRequests": []
            }),
        );
        Self(map)
    }

    /// Returns a sub-document by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Replaces a sub-document.
    pub fn set_section(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Iterates over `(name, sub-document)` pairs.
    pub fn sections(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Looks up the node at a dotted path.
    #[must_use]
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        path::get_path(&self.0, path)
    }

    /// Writes a node at a dotted path.
    pub fn set_path(&mut self, path: &FieldPath, value: Value) {
        path::set_path(&mut self.0, path, value);
    }

    /// Borrows the underlying tree.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the payload, returning the underlying tree.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One replica's (or the remote authority's) full copy of a user's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Player the data belongs to.
    pub user_id: UserId,
    /// Device that last wrote this snapshot.
    pub device_id: DeviceId,
    /// Platform of the writing device.
    pub platform: Platform,
    /// Schema version of the payload.
    pub schema_version: u32,
    /// Last successful reconciliation this replica took part in.
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// The synchronized data tree.
    pub payload: Payload,
}

impl Snapshot {
    /// Builds the default snapshot for a user who has no data yet.
    #[must_use]
    pub fn new_default(user_id: UserId, device_id: DeviceId, platform: Platform) -> Self {
        Self {
            user_id,
            device_id,
            platform,
            schema_version: SCHEMA_VERSION,
            last_sync_at: None,
            payload: Payload::initial(),
        }
    }

    /// Records a successful reconciliation at `at`.
    ///
    /// `last_sync_at` never moves backwards, even if the clock does.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_sync_at = Some(match self.last_sync_at {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }

    /// Serializes the snapshot to JSON bytes.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a snapshot from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
