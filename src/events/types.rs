use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::types::OperationKind;

/// Lifecycle events emitted while a batch runs.
///
/// These are the engine's integration surface for UI layers: a progress bar
/// subscribes to the tracker, but toasts, audit trails, and activity feeds
/// hang off this stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A job passed validation and authorization and is about to project
    BatchStarted {
        job_id: Uuid,
        operation: OperationKind,
        target_count: usize,
        started_at: DateTime<Utc>,
    },
    /// Tentative values written to the snapshot store
    BatchProjected { job_id: Uuid, projected: usize },
    /// A chunk of mutations was dispatched
    ChunkStarted {
        job_id: Uuid,
        chunk_index: usize,
        size: usize,
    },
    /// A chunk's barrier was crossed; every item in it settled
    ChunkCompleted {
        job_id: Uuid,
        chunk_index: usize,
        succeeded: usize,
        failed: usize,
    },
    /// A single item reached a terminal status
    ItemSettled {
        job_id: Uuid,
        id: String,
        success: bool,
    },
    /// The permission gate rejected the job before any work
    BatchDenied { job_id: Uuid, reason: String },
    /// The job settled; the store has been reconciled and resync issued
    BatchSettled {
        job_id: Uuid,
        overall_success: bool,
        succeeded: usize,
        failed: usize,
        duration_ms: u64,
    },
}

impl BatchEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BatchStarted { .. } => "batch_started",
            Self::BatchProjected { .. } => "batch_projected",
            Self::ChunkStarted { .. } => "chunk_started",
            Self::ChunkCompleted { .. } => "chunk_completed",
            Self::ItemSettled { .. } => "item_settled",
            Self::BatchDenied { .. } => "batch_denied",
            Self::BatchSettled { .. } => "batch_settled",
        }
    }

    /// The job this event belongs to
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::BatchStarted { job_id, .. }
            | Self::BatchProjected { job_id, .. }
            | Self::ChunkStarted { job_id, .. }
            | Self::ChunkCompleted { job_id, .. }
            | Self::ItemSettled { job_id, .. }
            | Self::BatchDenied { job_id, .. }
            | Self::BatchSettled { job_id, .. } => *job_id,
        }
    }
}
