//! Field-level conflicts and resolution policies.

use crate::ids::ConflictId;
use crate::path::FieldPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Strategy for turning a conflict list into one resolved snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Keep the local value at every conflicting path.
    Local,
    /// Keep the remote value at every conflicting path.
    Remote,
    /// Defer to a user decision.
    #[default]
    Prompt,
    /// Apply the type-aware combination rule at every conflicting path.
    Merge,
}

impl ResolutionPolicy {
    fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Prompt => "prompt",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "prompt" => Ok(Self::Prompt),
            "merge" => Ok(Self::Merge),
            other => Err(crate::Error::InvalidPolicy(other.to_string())),
        }
    }
}

/// How a single conflict was (or should be) settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum Resolution {
    /// The local value was kept.
    Local,
    /// The remote value was kept.
    Remote,
    /// The values were combined by the type-aware merge rule.
    Merge,
    /// An explicit value chosen by the user.
    Custom(Value),
}

/// A single path where local and remote disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub id: ConflictId,
    /// Dotted path into the payload.
    pub field_path: FieldPath,
    pub local_value: Value,
    pub remote_value: Value,
    /// When the divergence was observed.
    pub last_modified: DateTime<Utc>,
    /// Set once the conflict has been settled.
    #[serde(default)]
    pub resolution: Option<Resolution>,
}

impl Conflict {
    /// Creates an unresolved conflict.
    pub fn new(
        field_path: FieldPath,
        local_value: Value,
        remote_value: Value,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ConflictId::new(),
            field_path,
            local_value,
            remote_value,
            last_modified,
            resolution: None,
        }
    }

    /// Whether a resolution has been recorded.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
