//! Integration test for batch execution
//!
//! Tests the execution half of the engine end to end:
//! 1. Chunked dispatch in original target order
//! 2. The chunk width as the concurrency bound
//! 3. Failure isolation inside a chunk
//! 4. Live progress accounting
//! 5. Structural rejection before any remote call

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;

use batchops_core::engine::{
    BatchJob, MutationExecutor, OperationKind, ProgressTracker, ResyncHandler,
};
use batchops_core::error::BatchOpsError;
use serde_json::json;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_full_batch_settles_in_chunk_order() {
    let ids = account_ids(5);
    let store = seeded_store(&ids);
    let authority = Arc::new(MockAuthority::new());
    let manager = manager_with(
        store,
        Arc::new(ScriptedGate::allow()),
        Arc::new(RecordingResync::new()),
    );

    let result = tokio_test::assert_ok!(
        manager
            .run_batch(
                suspend_job(&ids),
                Arc::clone(&authority) as Arc<dyn MutationExecutor>,
            )
            .await
    );

    assert!(result.overall_success, "all mutations should succeed");
    assert_eq!(result.successful_ids, ids, "result follows target order");
    assert_eq!(result.failed_ids.len(), 0);
    assert_eq!(result.total, 5);

    // Chunk width 3: the first three invocations are the first chunk, the
    // last two the second, whatever the order inside each chunk
    let invocations = authority.invocations();
    assert_eq!(invocations.len(), 5);
    let mut first_chunk: Vec<_> = invocations[..3].to_vec();
    let mut second_chunk: Vec<_> = invocations[3..].to_vec();
    first_chunk.sort();
    second_chunk.sort();
    assert_eq!(first_chunk, &ids[..3]);
    assert_eq!(second_chunk, &ids[3..]);
}

#[tokio::test]
async fn test_chunk_width_bounds_concurrency() {
    let ids = account_ids(10);
    let store = seeded_store(&ids);
    let authority =
        Arc::new(MockAuthority::new().with_latency(Duration::from_millis(25)));
    let manager = manager_with(
        store,
        Arc::new(ScriptedGate::allow()),
        Arc::new(RecordingResync::new()),
    );

    let result = manager
        .run_batch(
            suspend_job(&ids),
            Arc::clone(&authority) as Arc<dyn MutationExecutor>,
        )
        .await
        .unwrap();

    assert!(result.overall_success);
    assert_eq!(authority.invocation_count(), 10);
    assert!(
        authority.peak_concurrency() <= 3,
        "no more than one chunk in flight, saw {}",
        authority.peak_concurrency()
    );
}

#[tokio::test]
async fn test_failures_do_not_abort_chunk_siblings() {
    let ids = account_ids(5);
    let store = seeded_store(&ids);
    let authority = Arc::new(MockAuthority::failing(&["acct-2"]));
    let manager = manager_with(
        store,
        Arc::new(ScriptedGate::allow()),
        Arc::new(RecordingResync::new()),
    );

    let result = manager
        .run_batch(
            suspend_job(&ids),
            Arc::clone(&authority) as Arc<dyn MutationExecutor>,
        )
        .await
        .unwrap();

    // The rejection settles one item; every sibling still executes
    assert_eq!(authority.invocation_count(), 5);
    assert!(!result.overall_success);
    assert_eq!(result.failed_ids, vec!["acct-2"]);
    assert_eq!(
        result.successful_ids,
        vec!["acct-1", "acct-3", "acct-4", "acct-5"]
    );
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].message, "authority rejected acct-2");
}

#[tokio::test]
async fn test_progress_stream_reaches_settlement() {
    let ids = account_ids(7);
    let store = seeded_store(&ids);
    let authority =
        Arc::new(MockAuthority::failing(&["acct-4"]).with_latency(Duration::from_millis(5)));
    let manager = manager_with(
        store,
        Arc::new(ScriptedGate::allow()),
        Arc::new(RecordingResync::new()),
    );

    let job = suspend_job(&ids);
    let tracker = Arc::new(ProgressTracker::new(&job.target_ids));
    let mut progress_rx = tracker.subscribe();
    let observer = tokio::spawn(async move {
        let mut states = Vec::new();
        while progress_rx.changed().await.is_ok() {
            let state = progress_rx.borrow_and_update().clone();
            let settled = state.is_settled();
            states.push(state);
            if settled {
                break;
            }
        }
        states
    });

    let result = manager
        .run_batch_with_tracker(
            job,
            Arc::clone(&authority) as Arc<dyn MutationExecutor>,
            Arc::clone(&tracker),
        )
        .await
        .unwrap();
    let states = observer.await.unwrap();

    // Accounting balances in every observed state, not just the last one
    for state in &states {
        assert_eq!(state.completed + state.failed + state.in_flight, state.total);
        assert!(state.percentage() <= 100.0);
    }
    let settled: Vec<usize> = states.iter().map(|s| s.settled()).collect();
    assert!(
        settled.windows(2).all(|pair| pair[0] <= pair[1]),
        "settlement count never goes backwards: {settled:?}"
    );

    let last = states.last().unwrap();
    assert!(last.is_settled());
    assert_eq!(last.in_flight, 0);
    assert_eq!(last.completed, 6);
    assert_eq!(last.failed, 1);
    assert!((last.percentage() - 100.0).abs() < f64::EPSILON);
    assert_eq!(result.failed_ids, vec!["acct-4"]);
}

#[tokio::test]
async fn test_malformed_jobs_rejected_before_any_execution() {
    let ids = account_ids(3);
    let store = seeded_store(&ids);
    let authority = Arc::new(MockAuthority::new());
    let manager = manager_with(
        Arc::clone(&store),
        Arc::new(ScriptedGate::allow()),
        Arc::new(RecordingResync::new()),
    );

    let empty = BatchJob::new(OperationKind::Suspend, vec![], json!({}));
    let duplicated = BatchJob::new(
        OperationKind::Suspend,
        vec!["acct-1".to_string(), "acct-1".to_string()],
        json!({}),
    );
    let missing_role = BatchJob::new(
        OperationKind::AssignRole,
        vec!["acct-1".to_string()],
        json!({}),
    );
    let oversized = BatchJob::new(OperationKind::Suspend, account_ids(101), json!({}));

    for job in [empty, duplicated, missing_role, oversized] {
        let err = manager
            .run_batch(job, Arc::clone(&authority) as Arc<dyn MutationExecutor>)
            .await
            .unwrap_err();
        assert!(
            matches!(err, BatchOpsError::MalformedJob { .. }),
            "expected malformed job, got {err:?}"
        );
    }

    // Nothing reached the authority and nothing was written
    assert_eq!(authority.invocation_count(), 0);
    for id in &ids {
        assert_eq!(store.version(id), Some(1));
    }
}

#[tokio::test]
async fn test_mismatched_tracker_rejected_before_any_execution() {
    let ids = account_ids(4);
    let store = seeded_store(&ids);
    let authority = Arc::new(MockAuthority::new());
    let manager = manager_with(
        Arc::clone(&store),
        Arc::new(ScriptedGate::allow()),
        Arc::new(RecordingResync::new()),
    );

    // Tracker built over a different selection than the job's targets
    let short_tracker = Arc::new(ProgressTracker::new(&ids[..2]));
    let err = manager
        .run_batch_with_tracker(
            suspend_job(&ids),
            Arc::clone(&authority) as Arc<dyn MutationExecutor>,
            short_tracker,
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, BatchOpsError::MalformedJob { .. }),
        "expected malformed job, got {err:?}"
    );
    assert_eq!(authority.invocation_count(), 0);
    for id in &ids {
        assert_eq!(store.version(id), Some(1));
    }
}

#[tokio::test]
async fn test_precancelled_batch_settles_everything_as_failed() {
    let ids = account_ids(4);
    let store = seeded_store(&ids);
    let authority = Arc::new(MockAuthority::new());
    let resync = Arc::new(RecordingResync::new());
    let manager = manager_with(
        Arc::clone(&store),
        Arc::new(ScriptedGate::allow()),
        Arc::clone(&resync) as Arc<dyn ResyncHandler>,
    );

    let job = suspend_job(&ids);
    let tracker = Arc::new(ProgressTracker::new(&job.target_ids));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = manager
        .run_batch_with_controls(
            job,
            Arc::clone(&authority) as Arc<dyn MutationExecutor>,
            Arc::clone(&tracker),
            cancel,
        )
        .await
        .unwrap();

    // Cancellation still settles: every item failed, none dispatched
    assert!(!result.overall_success);
    assert_eq!(result.failed_ids, ids);
    assert_eq!(authority.invocation_count(), 0);
    assert!(result
        .errors
        .iter()
        .all(|failure| failure.message.contains("cancelled")));
    assert!(tracker.state().is_settled());

    // Projections were applied, then rolled back on failure
    for id in &ids {
        assert_eq!(store.version(id), Some(3), "seed, projection, revert");
        let value = store.get(id).unwrap();
        let doc = value.as_entity().unwrap();
        assert_eq!(doc["active"], json!(true));
    }

    // The resync hook still runs after a cancelled settlement
    assert_eq!(resync.call_count(), 1);
}
