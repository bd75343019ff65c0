//! # Batch Simulation
//!
//! Runs the full engine against a simulated flaky authority: seeds a snapshot
//! store with user accounts, launches a suspend batch, streams progress to
//! stdout, and shows the post-settlement reconciliation (tentative values for
//! successes, rollbacks for failures).
//!
//! ```bash
//! cargo run --bin batch-sim            # 20 targets
//! cargo run --bin batch-sim -- 50     # 50 targets
//! ```

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use batchops_core::config::ConfigManager;
use batchops_core::engine::{
    AllowAllGate, BatchJob, MutationExecutor, MutationOutcome, OperationKind, ProgressTracker,
    ReconciliationManager, ResyncHandler,
};
use batchops_core::logging::init_structured_logging;
use batchops_core::snapshot::{SnapshotStore, SnapshotValue};

/// Simulated authority: fixed latency per call, and every account index
/// divisible by 7 is held by a compliance lock
struct FlakyAuthority {
    latency: Duration,
}

#[async_trait::async_trait]
impl MutationExecutor for FlakyAuthority {
    async fn execute(
        &self,
        id: &str,
        _operation: OperationKind,
        _parameters: &serde_json::Value,
    ) -> MutationOutcome {
        tokio::time::sleep(self.latency).await;
        let index: u64 = id
            .rsplit('-')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if index % 7 == 0 {
            MutationOutcome::failure("account is under a compliance hold")
        } else {
            MutationOutcome::ok()
        }
    }
}

/// Resync hook that just reports what a real one would refresh
struct LoggingResync;

#[async_trait::async_trait]
impl ResyncHandler for LoggingResync {
    async fn resync(&self, keys: &[String]) {
        info!(keys = keys.len(), "Authority resync requested");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_structured_logging();

    let target_count: usize = std::env::args()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let config = ConfigManager::load()?.into_config();
    let store = Arc::new(SnapshotStore::new(config.snapshot.event_capacity));
    let target_ids: Vec<String> = (1..=target_count).map(|i| format!("user-{i}")).collect();
    for (i, id) in target_ids.iter().enumerate() {
        store.set(
            id.clone(),
            SnapshotValue::entity(json!({
                "name": format!("User {}", i + 1),
                "active": true,
                "role": "member",
            })),
        );
    }
    println!("seeded {} accounts, chunk size {}", store.len(), config.execution.chunk_size);

    let manager = ReconciliationManager::new(
        Arc::clone(&store),
        Arc::new(AllowAllGate),
        Arc::new(LoggingResync),
        config,
    );

    let job = BatchJob::new(
        OperationKind::Suspend,
        target_ids.clone(),
        json!({ "reason": "quarterly access review" }),
    );

    let tracker = Arc::new(ProgressTracker::new(&job.target_ids));
    let mut progress_rx = tracker.subscribe();
    let progress_task = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let state = progress_rx.borrow_and_update().clone();
            println!(
                "progress: {}/{} settled ({:>3.0}%), {} failed",
                state.settled(),
                state.total,
                state.percentage(),
                state.failed
            );
            if state.is_settled() {
                break;
            }
        }
    });

    let executor = Arc::new(FlakyAuthority {
        latency: Duration::from_millis(40),
    });
    let result = manager
        .run_batch_with_tracker(job, executor, Arc::clone(&tracker))
        .await?;
    progress_task.await?;

    println!();
    println!(
        "batch {}: {} succeeded, {} failed of {}",
        if result.overall_success { "succeeded" } else { "settled with failures" },
        result.succeeded(),
        result.failed(),
        result.total
    );
    for failure in &result.errors {
        println!("  failed {}: {}", failure.id, failure.message);
    }

    // Reconciliation check: failures rolled back, successes kept tentative
    for id in result.failed_ids.iter().chain(result.successful_ids.iter().take(1)) {
        if let Some(SnapshotValue::Entity(doc)) = store.get(id) {
            println!("  snapshot {}: active={}", id, doc["active"]);
        }
    }

    Ok(())
}
