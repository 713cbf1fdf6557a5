//! Tracked sync attempts.

use crate::conflict::Conflict;
use crate::ids::{OperationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Upload,
    Download,
}

/// Lifecycle state of a sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    InProgress,
    /// Parked until a user decides the outstanding conflicts.
    AwaitingResolution,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Completed and failed operations are never resurrected.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::AwaitingResolution => "awaiting_resolution",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One sync attempt, mutated in place as it advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    pub id: OperationId,
    pub user_id: UserId,
    pub kind: OperationKind,
    pub status: OperationStatus,
    /// Percentage, 0 to 100. Never decreases.
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Bytes to transfer.
    pub data_size: u64,
    /// Bytes transferred so far.
    pub transferred_size: u64,
    pub error: Option<String>,
    /// Conflicts held while awaiting resolution.
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
}

impl SyncOperation {
    /// Creates a pending operation.
    pub fn new(user_id: UserId, kind: OperationKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id: OperationId::new(),
            user_id,
            kind,
            status: OperationStatus::Pending,
            progress: 0,
            started_at,
            ended_at: None,
            data_size: 0,
            transferred_size: 0,
            error: None,
            conflicts: Vec::new(),
        }
    }

    /// Creates an operation that is already in progress.
    pub fn started(user_id: UserId, kind: OperationKind, started_at: DateTime<Utc>) -> Self {
        Self {
            status: OperationStatus::InProgress,
            ..Self::new(user_id, kind, started_at)
        }
    }

    /// Creates an operation that failed before doing any work.
    pub fn failed(
        user_id: UserId,
        kind: OperationKind,
        error: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            status: OperationStatus::Failed,
            ended_at: Some(at),
            error: Some(error.into()),
            ..Self::new(user_id, kind, at)
        }
    }

    fn transition(&mut self, to: OperationStatus, allowed: &[OperationStatus]) -> crate::Result<()> {
        if !allowed.contains(&self.status) {
            return Err(crate::Error::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Pending -> in progress.
    pub fn start(&mut self) -> crate::Result<()> {
        self.transition(OperationStatus::InProgress, &[OperationStatus::Pending])
    }

    /// Raises progress to `percent` (clamped to 100). Lower values are ignored.
    pub fn advance(&mut self, percent: u8) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = self.progress.max(percent.min(100));
    }

    /// Records transfer sizes. `transferred` never decreases.
    pub fn record_transfer(&mut self, transferred: u64, total: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.data_size = total;
        self.transferred_size = self.transferred_size.max(transferred.min(total));
    }

    /// In progress -> awaiting resolution, holding the conflicts.
    pub fn await_resolution(&mut self, conflicts: Vec<Conflict>) -> crate::Result<()> {
        self.transition(
            OperationStatus::AwaitingResolution,
            &[OperationStatus::InProgress],
        )?;
        self.conflicts = conflicts;
        Ok(())
    }

    /// Awaiting resolution -> in progress.
    pub fn resume(&mut self) -> crate::Result<()> {
        self.transition(
            OperationStatus::InProgress,
            &[OperationStatus::AwaitingResolution],
        )
    }

    /// Marks the operation completed at `at`.
    pub fn complete(&mut self, at: DateTime<Utc>) -> crate::Result<()> {
        self.transition(OperationStatus::Completed, &[OperationStatus::InProgress])?;
        self.progress = 100;
        self.ended_at = Some(at);
        Ok(())
    }

    /// Marks the operation failed at `at` with `error`.
    pub fn fail(&mut self, error: impl Into<String>, at: DateTime<Utc>) -> crate::Result<()> {
        self.transition(
            OperationStatus::Failed,
            &[
                OperationStatus::Pending,
                OperationStatus::InProgress,
                OperationStatus::AwaitingResolution,
            ],
        )?;
        self.error = Some(error.into());
        self.ended_at = Some(at);
        Ok(())
    }
}
