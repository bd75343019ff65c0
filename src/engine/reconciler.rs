//! # Reconciliation Manager
//!
//! Top-level orchestrator for one batch: validate, authorize, project,
//! execute, settle. The manager owns the snapshot consistency story. It
//! applies tentative values before execution, captures the version of every
//! write, and after settlement rolls back exactly those failed items whose
//! snapshot entries nobody else has touched. A revert that loses its
//! compare-and-set is working as intended: the concurrent writer's value is
//! newer than the batch's stale pre-image.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use batchops_core::config::BatchOpsConfig;
//! use batchops_core::engine::reconciler::ReconciliationManager;
//! use batchops_core::engine::types::{
//!     AllowAllGate, BatchJob, MutationExecutor, MutationOutcome, NoopResync, OperationKind,
//! };
//! use batchops_core::snapshot::SnapshotStore;
//!
//! struct HttpExecutor;
//!
//! #[async_trait::async_trait]
//! impl MutationExecutor for HttpExecutor {
//!     async fn execute(
//!         &self,
//!         _id: &str,
//!         _operation: OperationKind,
//!         _parameters: &serde_json::Value,
//!     ) -> MutationOutcome {
//!         MutationOutcome::ok()
//!     }
//! }
//!
//! # async fn demo() -> batchops_core::error::Result<()> {
//! let store = Arc::new(SnapshotStore::default());
//! let manager = ReconciliationManager::new(
//!     Arc::clone(&store),
//!     Arc::new(AllowAllGate),
//!     Arc::new(NoopResync),
//!     BatchOpsConfig::default(),
//! );
//!
//! let job = BatchJob::new(
//!     OperationKind::Suspend,
//!     vec!["user-1".to_string(), "user-2".to_string()],
//!     json!({ "reason": "offboarding" }),
//! );
//! let result = manager.run_batch(job, Arc::new(HttpExecutor)).await?;
//! println!("succeeded: {}", result.succeeded());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::coordinator::BatchCoordinator;
use super::progress::ProgressTracker;
use super::projector::{OptimisticProjector, ProjectedChange};
use super::types::{
    AuthorizationDecision, BatchJob, BatchResult, MutationExecutor, PermissionGate,
    ResyncHandler,
};
use crate::config::BatchOpsConfig;
use crate::error::{BatchOpsError, Result};
use crate::events::{BatchEvent, EventPublisher};
use crate::snapshot::SnapshotStore;
use crate::state_machine::{JobEvent, JobStateMachine};

/// A tentative write applied to the store, with the version captured for
/// rollback
#[derive(Debug, Clone)]
struct AppliedProjection {
    change: ProjectedChange,
    version_at_projection: u64,
}

/// Drives batch jobs from creation to settlement
pub struct ReconciliationManager {
    store: Arc<SnapshotStore>,
    gate: Arc<dyn PermissionGate>,
    resync: Arc<dyn ResyncHandler>,
    publisher: EventPublisher,
    projector: OptimisticProjector,
    coordinator: BatchCoordinator,
    config: BatchOpsConfig,
}

impl ReconciliationManager {
    /// Create a manager over the given store and collaborators
    pub fn new(
        store: Arc<SnapshotStore>,
        gate: Arc<dyn PermissionGate>,
        resync: Arc<dyn ResyncHandler>,
        config: BatchOpsConfig,
    ) -> Self {
        let publisher = EventPublisher::new(config.events.capacity);
        let coordinator = BatchCoordinator::new(config.execution.clone(), publisher.clone());
        Self {
            store,
            gate,
            resync,
            publisher,
            projector: OptimisticProjector::new(),
            coordinator,
            config,
        }
    }

    /// The lifecycle event publisher; subscribe before launching a job to
    /// observe its events
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// The snapshot store this manager reconciles
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Run a batch to settlement with a private tracker
    pub async fn run_batch(
        &self,
        job: BatchJob,
        executor: Arc<dyn MutationExecutor>,
    ) -> Result<BatchResult> {
        let tracker = Arc::new(ProgressTracker::new(&job.target_ids));
        self.run_batch_with_controls(job, executor, tracker, CancellationToken::new())
            .await
    }

    /// Run a batch with a caller-held tracker for live progress observation
    pub async fn run_batch_with_tracker(
        &self,
        job: BatchJob,
        executor: Arc<dyn MutationExecutor>,
        tracker: Arc<ProgressTracker>,
    ) -> Result<BatchResult> {
        self.run_batch_with_controls(job, executor, tracker, CancellationToken::new())
            .await
    }

    /// Run a batch with a caller-held tracker and cancellation token.
    ///
    /// Cancellation is best-effort: checked between chunks, never
    /// interrupting a dispatched mutation. The tracker must be sized over
    /// the job's target list; a mismatch is rejected as malformed.
    #[instrument(
        skip(self, job, executor, tracker, cancel),
        fields(job_id = %job.job_id, operation = %job.operation, targets = job.target_count())
    )]
    pub async fn run_batch_with_controls(
        &self,
        job: BatchJob,
        executor: Arc<dyn MutationExecutor>,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> Result<BatchResult> {
        let started = Instant::now();
        let mut machine = JobStateMachine::new(job.job_id);

        // Synchronous structural rejection; nothing has been touched yet
        job.validate(self.config.execution.max_targets_per_job)?;
        if tracker.total() != job.target_count() {
            return Err(BatchOpsError::malformed_job(format!(
                "progress tracker sized for {} items, job has {} targets",
                tracker.total(),
                job.target_count()
            )));
        }

        // One authorization decision for the whole batch, before any
        // optimistic write
        if let AuthorizationDecision::Deny { reason } = self.gate.authorize(&job).await {
            warn!(reason = %reason, "⛔ BATCH: Denied by permission gate");
            self.publisher.publish(BatchEvent::BatchDenied {
                job_id: job.job_id,
                reason: reason.clone(),
            });
            return Err(BatchOpsError::PermissionDenied { reason });
        }

        info!(
            "🚀 BATCH: Starting {} for {} targets",
            job.operation,
            job.target_count()
        );
        self.publisher.publish(BatchEvent::BatchStarted {
            job_id: job.job_id,
            operation: job.operation,
            target_count: job.target_count(),
            started_at: chrono::Utc::now(),
        });

        machine.transition(JobEvent::Project)?;
        let applied = self.apply_projections(&job, &tracker);
        self.publisher.publish(BatchEvent::BatchProjected {
            job_id: job.job_id,
            projected: applied.len(),
        });

        machine.transition(JobEvent::Launch)?;
        let result = self
            .coordinator
            .run(&job, executor, Arc::clone(&tracker), cancel)
            .await;

        machine.transition(JobEvent::Settle)?;
        self.revert_failed(&result, &applied);

        // Authority refresh runs after every settlement, success or not:
        // it converges the conflict-skipped keys and confirms the rest
        self.resync.resync(&job.target_ids).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        if result.overall_success {
            info!(
                duration_ms,
                succeeded = result.succeeded(),
                "✅ BATCH: Settled successfully"
            );
        } else {
            warn!(
                duration_ms,
                succeeded = result.succeeded(),
                failed = result.failed(),
                "⚠️ BATCH: Settled with failures"
            );
        }
        self.publisher.publish(BatchEvent::BatchSettled {
            job_id: job.job_id,
            overall_success: result.overall_success,
            succeeded: result.succeeded(),
            failed: result.failed(),
            duration_ms,
        });

        Ok(result)
    }

    /// Write tentative values into the store, capturing versions for rollback
    fn apply_projections(
        &self,
        job: &BatchJob,
        tracker: &Arc<ProgressTracker>,
    ) -> HashMap<String, AppliedProjection> {
        let changes = self.projector.project(job, &self.store);
        let mut applied = HashMap::with_capacity(changes.len());

        for (id, change) in changes {
            tracker.prime_original(&id, change.previous.clone());
            let version_at_projection = self.store.set(id.clone(), change.tentative.clone());
            applied.insert(
                id,
                AppliedProjection {
                    change,
                    version_at_projection,
                },
            );
        }

        debug!(applied = applied.len(), "Applied optimistic projections");
        applied
    }

    /// Roll back failed items whose snapshot entries nobody else has touched
    fn revert_failed(&self, result: &BatchResult, applied: &HashMap<String, AppliedProjection>) {
        let mut reverted = 0usize;
        let mut conflicts = 0usize;

        for id in &result.failed_ids {
            // Items absent from the snapshot were never projected; nothing
            // to roll back
            let Some(projection) = applied.get(id) else {
                continue;
            };

            if self.store.set_if_version(
                id,
                projection.version_at_projection,
                projection.change.previous.clone(),
            ) {
                reverted += 1;
            } else {
                // The key moved since projection; the newer write wins and
                // resync will converge it
                conflicts += 1;
                debug!(item_id = %id, "Revert skipped, snapshot version moved since projection");
            }
        }

        if reverted > 0 || conflicts > 0 {
            info!(reverted, conflicts, "🔄 BATCH: Rolled back failed projections");
        }
    }
}
