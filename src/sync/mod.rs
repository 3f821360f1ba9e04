//! Replay of the offline action queue against the Loom backend.
//!
//! A pass snapshots the queue once and walks it oldest first. Each action
//! ends the pass in exactly one of three places: removed (delivered, 404,
//! or dropped), or still queued with its retry count bumped. The
//! coordinator makes sure at most one pass runs at a time.

pub mod coordinator;
pub mod executor;
pub mod request;
pub mod transport;

use serde::Serialize;
use uuid::Uuid;

pub use coordinator::{SyncCoordinator, SyncOutcome, SyncState};
pub use executor::SyncExecutor;
pub use request::{DeliveryRequest, MappingError};
pub use transport::{HttpTransport, Transport, TransportError};

/// What asked for a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncTrigger {
    ConnectivityRestored,
    BackgroundWake { tag: String },
    Manual,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::ConnectivityRestored => write!(f, "connectivity restored"),
            SyncTrigger::BackgroundWake { tag } => write!(f, "background wake '{tag}'"),
            SyncTrigger::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub trigger: SyncTrigger,
    /// Actions a request was attempted for (including local defects).
    pub attempted: u32,
    pub delivered: u32,
    /// Actions settled by a 404 from the backend.
    pub conflicts: u32,
    pub retried: u32,
    pub dropped: u32,
    /// Set when the pass stopped early for lack of a credential.
    pub aborted: bool,
}

impl PassReport {
    pub fn new(trigger: SyncTrigger) -> Self {
        Self {
            trigger,
            attempted: 0,
            delivered: 0,
            conflicts: 0,
            retried: 0,
            dropped: 0,
            aborted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    RetriesExhausted,
    UnknownType,
    MalformedPayload,
}

/// Published on the agent's broadcast channel as a pass progresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    PassStarted { trigger: SyncTrigger, queued: usize },
    Delivered { id: Uuid },
    ConflictResolved { id: Uuid },
    RetryScheduled { id: Uuid, retry_count: i32, max_retries: i32 },
    Dropped { id: Uuid, action_type: String, reason: DropReason },
    PassAborted { remaining: usize },
    PassFinished { report: PassReport },
}
