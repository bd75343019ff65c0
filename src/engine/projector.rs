//! # Optimistic Projector
//!
//! Computes the tentative snapshot value an operation is expected to produce
//! for each target, before the authority has confirmed anything. Projection is
//! a pure read: it never writes the store, never calls the executor, and never
//! blocks. The reconciliation flow applies the returned changes and captures
//! the versions needed for rollback.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::types::{BatchJob, OperationKind};
use crate::snapshot::{SnapshotStore, SnapshotValue};

/// The pre-image and expected post-image for one target
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedChange {
    /// Snapshot value before the batch touched the key
    pub previous: SnapshotValue,
    /// Value the operation is expected to produce
    pub tentative: SnapshotValue,
}

/// Pure projection of a batch job over current snapshot state
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimisticProjector;

impl OptimisticProjector {
    pub fn new() -> Self {
        Self
    }

    /// Project the job over the store's current state.
    ///
    /// Targets absent from the store are skipped; they still execute
    /// remotely, there is just nothing local to show or revert for them.
    pub fn project(
        &self,
        job: &BatchJob,
        store: &SnapshotStore,
    ) -> HashMap<String, ProjectedChange> {
        // One timestamp for the whole pass so every projected item carries
        // the same stamp
        let now = Utc::now();
        let mut changes = HashMap::with_capacity(job.target_ids.len());

        for id in &job.target_ids {
            let Some(previous) = store.get(id) else {
                debug!(target_id = %id, "Skipping projection for id absent from snapshot");
                continue;
            };

            let tentative =
                self.tentative_value(&previous, job.operation, &job.parameters, now);
            changes.insert(
                id.clone(),
                ProjectedChange {
                    previous,
                    tentative,
                },
            );
        }

        changes
    }

    /// Derive the expected post-image for one value
    fn tentative_value(
        &self,
        current: &SnapshotValue,
        operation: OperationKind,
        parameters: &Value,
        now: DateTime<Utc>,
    ) -> SnapshotValue {
        if operation.is_destructive() {
            return SnapshotValue::PendingDelete;
        }

        let SnapshotValue::Entity(doc) = current else {
            // Already awaiting deletion; non-delete edits have nothing to
            // apply to
            return SnapshotValue::PendingDelete;
        };

        let mut doc = doc.clone();
        if let Some(fields) = doc.as_object_mut() {
            match operation {
                OperationKind::Suspend => {
                    fields.insert("active".to_string(), Value::Bool(false));
                    fields.insert(
                        "suspended_at".to_string(),
                        Value::String(now.to_rfc3339()),
                    );
                    if let Some(reason) = parameters.get("reason").and_then(Value::as_str) {
                        fields.insert(
                            "suspended_reason".to_string(),
                            Value::String(reason.to_string()),
                        );
                    }
                }
                OperationKind::Reactivate => {
                    fields.insert("active".to_string(), Value::Bool(true));
                    fields.remove("suspended_at");
                    fields.remove("suspended_reason");
                }
                OperationKind::AssignRole => {
                    if let Some(role) = parameters.get("role").and_then(Value::as_str) {
                        fields.insert("role".to_string(), Value::String(role.to_string()));
                        fields.insert(
                            "role_changed_at".to_string(),
                            Value::String(now.to_rfc3339()),
                        );
                    }
                }
                OperationKind::Delete => unreachable!("handled above"),
            }
        }

        SnapshotValue::Entity(doc)
    }
}
