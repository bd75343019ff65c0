//! # Batch Coordinator
//!
//! Chunked execution of a batch job against the remote authority. Targets run
//! in fixed-size, order-preserving chunks; every item in a chunk runs
//! concurrently on its own task, and the coordinator waits for the whole
//! chunk to settle before dispatching the next one. The chunk size is the
//! engine's only concurrency bound.
//!
//! Failure isolation is absolute: a failed or panicked sibling never aborts
//! the other items in its chunk, and no failure stops later chunks. The
//! coordinator never retries; callers re-run a new job over the failed subset
//! if they want another attempt.

use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::progress::ProgressTracker;
use super::types::{BatchJob, BatchResult, ItemFailure, MutationExecutor};
use crate::config::ExecutionConfig;
use crate::events::{BatchEvent, EventPublisher};

/// Runs a batch in fixed-size chunks with a barrier between chunks
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    config: ExecutionConfig,
    publisher: EventPublisher,
}

impl BatchCoordinator {
    /// Create a new coordinator with the given execution settings
    pub fn new(config: ExecutionConfig, publisher: EventPublisher) -> Self {
        Self { config, publisher }
    }

    /// Execute every target and settle the batch.
    ///
    /// Returns only after every item has a terminal status. Cancellation is
    /// best-effort: it is checked before each chunk, dispatched items always
    /// settle naturally, and undispatched items are settled as failures so
    /// the progress invariants still hold.
    #[instrument(skip(self, job, executor, tracker, cancel), fields(job_id = %job.job_id, operation = %job.operation))]
    pub async fn run(
        &self,
        job: &BatchJob,
        executor: Arc<dyn MutationExecutor>,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> BatchResult {
        let chunk_size = self.config.chunk_size.max(1);
        let chunk_count = job.target_ids.len().div_ceil(chunk_size);

        info!(
            "🚀 BATCH: Launching {} items in {} chunks of up to {}",
            job.target_ids.len(),
            chunk_count,
            chunk_size
        );

        for (chunk_index, chunk) in job.target_ids.chunks(chunk_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(chunk_index, "Batch cancelled; settling undispatched items as failed");
                self.fail_unsettled(job, &tracker);
                break;
            }
            self.run_chunk(job, chunk, chunk_index, &executor, &tracker)
                .await;
        }

        self.build_result(job, &tracker)
    }

    /// Dispatch one chunk and wait at its barrier
    async fn run_chunk(
        &self,
        job: &BatchJob,
        chunk: &[String],
        chunk_index: usize,
        executor: &Arc<dyn MutationExecutor>,
        tracker: &Arc<ProgressTracker>,
    ) {
        tracker.mark_in_flight(chunk);
        self.publisher.publish(BatchEvent::ChunkStarted {
            job_id: job.job_id,
            chunk_index,
            size: chunk.len(),
        });

        let mut task_futures = Vec::with_capacity(chunk.len());
        for id in chunk {
            let id = id.clone();
            let operation = job.operation;
            let parameters = job.parameters.clone();
            let executor = Arc::clone(executor);
            let tracker = Arc::clone(tracker);

            let handle = tokio::spawn(async move {
                let outcome = executor.execute(&id, operation, &parameters).await;
                let success = outcome.success;
                tracker.record_settled(&id, success, outcome.error);
                (id, success)
            });
            task_futures.push(handle);
        }

        // The barrier: every mutation in this chunk settles before the next
        // chunk is dispatched
        let results = join_all(task_futures).await;

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (position, result) in results.into_iter().enumerate() {
            let (id, success) = match result {
                Ok(settled) => settled,
                Err(join_error) => {
                    // The task panicked before it could report; settle the
                    // item here so nothing is left dangling
                    let id = chunk[position].clone();
                    warn!(
                        item_id = %id,
                        error = %join_error,
                        "Chunk task panicked, recording item failure"
                    );
                    tracker.record_settled(
                        &id,
                        false,
                        Some(format!("task panicked: {join_error}")),
                    );
                    (id, false)
                }
            };

            if success {
                succeeded += 1;
            } else {
                failed += 1;
            }
            self.publisher.publish(BatchEvent::ItemSettled {
                job_id: job.job_id,
                id,
                success,
            });
        }

        debug!(chunk_index, succeeded, failed, "Chunk barrier crossed");
        self.publisher.publish(BatchEvent::ChunkCompleted {
            job_id: job.job_id,
            chunk_index,
            succeeded,
            failed,
        });
    }

    /// Settle every item that never reached a terminal status
    fn fail_unsettled(&self, job: &BatchJob, tracker: &Arc<ProgressTracker>) {
        for id in &job.target_ids {
            let unsettled = tracker
                .item(id)
                .is_some_and(|item| !item.status.is_terminal());
            if unsettled {
                tracker.record_settled(
                    id,
                    false,
                    Some("batch cancelled before dispatch".to_string()),
                );
                self.publisher.publish(BatchEvent::ItemSettled {
                    job_id: job.job_id,
                    id: id.clone(),
                    success: false,
                });
            }
        }
    }

    /// Derive the final result from tracker state, in target order.
    ///
    /// Walking `target_ids` (not settlement order) makes the result
    /// deterministic no matter how items raced within their chunks.
    fn build_result(&self, job: &BatchJob, tracker: &Arc<ProgressTracker>) -> BatchResult {
        let mut successful_ids = Vec::new();
        let mut failed_ids = Vec::new();
        let mut errors: Vec<ItemFailure> = Vec::new();

        for id in &job.target_ids {
            match tracker.item(id) {
                Some(item) if item.status.is_success() => successful_ids.push(id.clone()),
                Some(item) if item.status.is_terminal() => {
                    failed_ids.push(id.clone());
                    if let Some(failure) = tracker.failure_for(id) {
                        errors.push(failure);
                    }
                }
                _ => {
                    // Every path above settles all items before we get here;
                    // close the gap rather than return an unsettled result
                    warn!(item_id = %id, "Item never settled, recording failure");
                    tracker.record_settled(id, false, Some("item never settled".to_string()));
                    failed_ids.push(id.clone());
                    if let Some(failure) = tracker.failure_for(id) {
                        errors.push(failure);
                    }
                }
            }
        }

        BatchResult {
            job_id: job.job_id,
            operation: job.operation,
            overall_success: failed_ids.is_empty(),
            successful_ids,
            failed_ids,
            errors,
            total: job.target_count(),
            settled_at: chrono::Utc::now(),
        }
    }
}
