//! Lifecycle events published by the engine.
//!
//! Delivery is a `tokio::sync::broadcast` channel: every subscriber sees
//! every event in emission order. A subscriber that falls more than
//! [`EVENT_CHANNEL_CAPACITY`] events behind observes `Lagged` and skips ahead.

use savesync_types::{Conflict, OperationId, UserId};
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the engine for the UI and observability collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A sync operation began.
    Started {
        operation_id: OperationId,
        user_id: UserId,
    },
    /// Operation progress advanced.
    Progress {
        operation_id: OperationId,
        percent: u8,
    },
    /// A sync operation completed.
    Completed {
        operation_id: OperationId,
        user_id: UserId,
    },
    /// A sync operation failed.
    Failed {
        operation_id: OperationId,
        user_id: UserId,
        error: String,
    },
    /// Local and remote disagree at one or more paths.
    ConflictDetected {
        operation_id: OperationId,
        conflicts: Vec<Conflict>,
    },
    /// The operation is parked until the user decides the conflicts.
    AwaitingResolution {
        operation_id: OperationId,
        conflicts: Vec<Conflict>,
    },
    /// Connectivity changed.
    ConnectivityChanged { online: bool },
}

impl SyncEvent {
    /// Short kebab-case event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "sync-started",
            Self::Progress { .. } => "sync-progress",
            Self::Completed { .. } => "sync-completed",
            Self::Failed { .. } => "sync-failed",
            Self::ConflictDetected { .. } => "conflict-detected",
            Self::AwaitingResolution { .. } => "awaiting-resolution",
            Self::ConnectivityChanged { .. } => "connectivity-changed",
        }
    }
}

/// Publishing side of the event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a bus with [`EVENT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Registers a new subscriber; it sees events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SyncEvent) {
        trace!("emit {}", event.name());
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
