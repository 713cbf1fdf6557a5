//! Append-only log of sync operations.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use savesync_types::{Conflict, OperationId, OperationKind, OperationStatus, SyncOperation, UserId};

/// Operations in creation order. Entries are never removed.
#[derive(Debug, Default)]
pub struct OperationTracker {
    operations: Vec<SyncOperation>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an in-progress operation.
    pub fn begin(&mut self, user_id: UserId, kind: OperationKind, now: DateTime<Utc>) -> OperationId {
        self.push(SyncOperation::started(user_id, kind, now))
    }

    /// Records an operation that failed before it could start.
    pub fn record_failed(
        &mut self,
        user_id: UserId,
        kind: OperationKind,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> OperationId {
        self.push(SyncOperation::failed(user_id, kind, error, now))
    }

    fn push(&mut self, op: SyncOperation) -> OperationId {
        let id = op.id;
        self.operations.push(op);
        id
    }

    pub fn get(&self, id: OperationId) -> Option<&SyncOperation> {
        self.operations.iter().find(|op| op.id == id)
    }

    fn get_mut(&mut self, id: OperationId) -> SyncResult<&mut SyncOperation> {
        self.operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| SyncError::OperationNotFound(id.to_string()))
    }

    /// Raises progress and returns the new value.
    pub fn advance(&mut self, id: OperationId, percent: u8) -> SyncResult<u8> {
        let op = self.get_mut(id)?;
        op.advance(percent);
        Ok(op.progress)
    }

    pub fn record_transfer(&mut self, id: OperationId, transferred: u64, total: u64) -> SyncResult<()> {
        self.get_mut(id)?.record_transfer(transferred, total);
        Ok(())
    }

    pub fn await_resolution(&mut self, id: OperationId, conflicts: Vec<Conflict>) -> SyncResult<()> {
        Ok(self.get_mut(id)?.await_resolution(conflicts)?)
    }

    /// Resumes a parked operation and returns its user.
    pub fn resume(&mut self, id: OperationId) -> SyncResult<UserId> {
        let op = self.get_mut(id)?;
        if op.status != OperationStatus::AwaitingResolution {
            return Err(SyncError::NotAwaitingResolution(id.to_string()));
        }
        op.resume()?;
        Ok(op.user_id.clone())
    }

    pub fn complete(&mut self, id: OperationId, now: DateTime<Utc>) -> SyncResult<()> {
        Ok(self.get_mut(id)?.complete(now)?)
    }

    pub fn fail(&mut self, id: OperationId, error: impl Into<String>, now: DateTime<Utc>) -> SyncResult<()> {
        Ok(self.get_mut(id)?.fail(error, now)?)
    }

    pub fn operations(&self) -> &[SyncOperation] {
        &self.operations
    }

    pub fn latest(&self) -> Option<&SyncOperation> {
        self.operations.last()
    }

    /// Operations of `user_id` currently parked for resolution.
    pub fn awaiting(&self, user_id: &UserId) -> Vec<OperationId> {
        self.operations
            .iter()
            .filter(|op| op.status == OperationStatus::AwaitingResolution && op.user_id == *user_id)
            .map(|op| op.id)
            .collect()
    }
}
