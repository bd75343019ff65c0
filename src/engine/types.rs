//! # Engine Types
//!
//! Core types shared across the batch mutation engine: operation kinds, batch
//! jobs, per-item statuses and outcomes, settled results, and the collaborator
//! traits the engine delegates to (remote execution, authorization, resync).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::{BatchOpsError, Result};
use crate::snapshot::SnapshotValue;

/// The administrative operation a batch applies to every target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Deactivate the account, keeping its data
    Suspend,
    /// Restore a suspended account to active
    Reactivate,
    /// Replace the account's role
    AssignRole,
    /// Remove the account entirely
    Delete,
}

impl OperationKind {
    /// Check if this operation removes the entity rather than editing it
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete)
    }

    /// Check if this operation requires a `role` parameter
    pub fn requires_role_parameter(&self) -> bool {
        matches!(self, Self::AssignRole)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend => write!(f, "suspend"),
            Self::Reactivate => write!(f, "reactivate"),
            Self::AssignRole => write!(f, "assign_role"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "suspend" => Ok(Self::Suspend),
            "reactivate" => Ok(Self::Reactivate),
            "assign_role" => Ok(Self::AssignRole),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Invalid operation kind: {s}")),
        }
    }
}

/// A request to apply one operation to a set of target entities.
///
/// Jobs are created, run to settlement once, and discarded. Structural
/// validation happens synchronously in [`BatchJob::validate`] before any
/// snapshot write or remote call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: Uuid,
    pub operation: OperationKind,
    pub target_ids: Vec<String>,
    /// Operation-specific parameters (e.g. `role` for assign_role,
    /// optional `reason` for suspend)
    pub parameters: Value,
    pub requested_at: DateTime<Utc>,
}

impl BatchJob {
    /// Create a new job with a fresh id and timestamp
    pub fn new(operation: OperationKind, target_ids: Vec<String>, parameters: Value) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            operation,
            target_ids,
            parameters,
            requested_at: Utc::now(),
        }
    }

    /// Validate the job's structure.
    ///
    /// Rejections here are synchronous and side-effect free: no snapshot
    /// write, no executor call, no projection has happened yet.
    pub fn validate(&self, max_targets: usize) -> Result<()> {
        if self.target_ids.is_empty() {
            return Err(BatchOpsError::malformed_job("job has no target ids"));
        }

        if self.target_ids.len() > max_targets {
            return Err(BatchOpsError::malformed_job(format!(
                "job has {} targets, limit is {max_targets}",
                self.target_ids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.target_ids.len());
        for id in &self.target_ids {
            if id.is_empty() {
                return Err(BatchOpsError::malformed_job("empty target id"));
            }
            if !seen.insert(id.as_str()) {
                return Err(BatchOpsError::malformed_job(format!(
                    "duplicate target id: {id}"
                )));
            }
        }

        if self.operation.requires_role_parameter() {
            let role_ok = self
                .parameters
                .get("role")
                .and_then(Value::as_str)
                .is_some_and(|role| !role.is_empty());
            if !role_ok {
                return Err(BatchOpsError::malformed_job(
                    "assign_role requires a non-empty 'role' parameter",
                ));
            }
        }

        Ok(())
    }

    /// Number of targets in this job
    pub fn target_count(&self) -> usize {
        self.target_ids.len()
    }
}

/// Status of a single item within a running batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Not yet dispatched
    Pending,
    /// Dispatched, awaiting the executor's verdict
    InFlight,
    /// Settled successfully
    Succeeded,
    /// Settled with a failure
    Failed,
}

impl ItemStatus {
    /// Check if this item has settled (no further status changes allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Check if this item settled successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InFlight => write!(f, "in_flight"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-item record tracked for the lifetime of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub status: ItemStatus,
    pub error: Option<String>,
}

impl BatchItem {
    /// Create a fresh pending item
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Pending,
            error: None,
        }
    }
}

/// The executor's verdict for one item.
///
/// Expected failures travel here as data; an executor that panics instead is
/// caught by the coordinator and converted into a failure outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl MutationOutcome {
    /// A successful mutation
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed mutation with the authority's error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// The error message, or a placeholder when the authority gave none
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "unspecified failure".to_string())
    }
}

/// A failed item with enough context for display and audit.
///
/// `original_value` is the snapshot value captured at projection time; `None`
/// when the item had no snapshot entry before the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub message: String,
    pub original_value: Option<SnapshotValue>,
}

/// Final, immutable summary of a settled batch.
///
/// Id lists follow the job's original target order, so intra-chunk settlement
/// order never changes the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub job_id: Uuid,
    pub operation: OperationKind,
    pub overall_success: bool,
    pub successful_ids: Vec<String>,
    pub failed_ids: Vec<String>,
    pub errors: Vec<ItemFailure>,
    pub total: usize,
    pub settled_at: DateTime<Utc>,
}

impl BatchResult {
    /// Number of items that settled successfully
    pub fn succeeded(&self) -> usize {
        self.successful_ids.len()
    }

    /// Number of items that settled with a failure
    pub fn failed(&self) -> usize {
        self.failed_ids.len()
    }
}

/// Decision returned by the permission gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AuthorizationDecision {
    /// The batch may proceed
    Allow,
    /// The batch must not start; `reason` is surfaced to the caller
    Deny { reason: String },
}

impl AuthorizationDecision {
    /// Check if the batch may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Create a denial with the given reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }
}

/// Remote mutation executor.
///
/// The engine owns concurrency, chunking, progress, and reconciliation;
/// implementations only perform one mutation against the authority and report
/// the verdict. Invocation is at-least-once per item; idempotency is the
/// implementation's concern.
#[async_trait::async_trait]
pub trait MutationExecutor: Send + Sync {
    /// Apply `operation` to the entity `id` and report the verdict
    async fn execute(&self, id: &str, operation: OperationKind, parameters: &Value)
        -> MutationOutcome;
}

/// Pre-flight authorization for a whole batch.
///
/// Consulted exactly once per job, before any optimistic write. A denial
/// aborts the batch with zero side effects.
#[async_trait::async_trait]
pub trait PermissionGate: Send + Sync {
    /// Decide whether this job may run
    async fn authorize(&self, job: &BatchJob) -> AuthorizationDecision;
}

/// Post-settlement authority refresh.
///
/// Invoked unconditionally after every settlement with the job's full target
/// list; implementations are expected to fetch fresh authority state and
/// write it back through the snapshot store.
#[async_trait::async_trait]
pub trait ResyncHandler: Send + Sync {
    /// Refresh the given keys from the authority
    async fn resync(&self, keys: &[String]);
}

/// Gate that allows every job (embedding and tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGate;

#[async_trait::async_trait]
impl PermissionGate for AllowAllGate {
    async fn authorize(&self, _job: &BatchJob) -> AuthorizationDecision {
        AuthorizationDecision::Allow
    }
}

/// Resync handler that does nothing (embedding and tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResync;

#[async_trait::async_trait]
impl ResyncHandler for NoopResync {
    async fn resync(&self, _keys: &[String]) {}
}
