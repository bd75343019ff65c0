use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use batchops_core::config::BatchOpsConfig;
use batchops_core::engine::{
    AuthorizationDecision, BatchJob, MutationExecutor, MutationOutcome, OperationKind,
    PermissionGate, ReconciliationManager, ResyncHandler,
};
use batchops_core::snapshot::{SnapshotStore, SnapshotValue};

/// Scriptable mutation authority for driving the engine in tests.
///
/// Records every invocation and the peak number of concurrently running
/// mutations, so tests can assert both coverage and the concurrency bound.
#[derive(Debug, Default)]
pub struct MockAuthority {
    failing: HashSet<String>,
    latency: Duration,
    invocations: Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl MockAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authority that rejects the given ids and accepts everything else
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| (*id).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Add per-call latency, useful for observing in-flight counts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add ids the authority will reject
    pub fn with_failing_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.failing.extend(ids);
        self
    }

    /// Ids executed so far, in dispatch order
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    /// Highest number of mutations observed running at the same instant
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MutationExecutor for MockAuthority {
    async fn execute(
        &self,
        id: &str,
        _operation: OperationKind,
        _parameters: &Value,
    ) -> MutationOutcome {
        self.invocations.lock().push(id.to_string());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.failing.contains(id) {
            MutationOutcome::failure(format!("authority rejected {id}"))
        } else {
            MutationOutcome::ok()
        }
    }
}

/// Permission gate with a fixed scripted decision
pub struct ScriptedGate {
    decision: AuthorizationDecision,
}

impl ScriptedGate {
    pub fn allow() -> Self {
        Self {
            decision: AuthorizationDecision::Allow,
        }
    }

    pub fn deny(reason: &str) -> Self {
        Self {
            decision: AuthorizationDecision::deny(reason),
        }
    }
}

#[async_trait]
impl PermissionGate for ScriptedGate {
    async fn authorize(&self, _job: &BatchJob) -> AuthorizationDecision {
        self.decision.clone()
    }
}

/// Resync handler that records every call and the keys it was given
#[derive(Debug, Default)]
pub struct RecordingResync {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingResync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ResyncHandler for RecordingResync {
    async fn resync(&self, keys: &[String]) {
        self.calls.lock().push(keys.to_vec());
    }
}

/// Sequential account ids: `acct-1` through `acct-{count}`
pub fn account_ids(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("acct-{i}")).collect()
}

/// Store seeded with one active account entity per id, all at version 1
pub fn seeded_store(ids: &[String]) -> Arc<SnapshotStore> {
    let store = Arc::new(SnapshotStore::new(64));
    for (i, id) in ids.iter().enumerate() {
        store.set(
            id.clone(),
            SnapshotValue::entity(json!({
                "name": format!("Account {}", i + 1),
                "active": true,
                "role": "member",
            })),
        );
    }
    store
}

/// Suspend job over the given targets with a stock reason
pub fn suspend_job(ids: &[String]) -> BatchJob {
    BatchJob::new(
        OperationKind::Suspend,
        ids.to_vec(),
        json!({ "reason": "access review" }),
    )
}

/// Manager wired with the test configuration (chunk size 3)
pub fn manager_with(
    store: Arc<SnapshotStore>,
    gate: Arc<dyn PermissionGate>,
    resync: Arc<dyn ResyncHandler>,
) -> ReconciliationManager {
    ReconciliationManager::new(store, gate, resync, BatchOpsConfig::for_testing())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_authority_tracks_invocations_and_verdicts() {
        let authority = MockAuthority::failing(&["acct-2"]);

        let ok = authority
            .execute("acct-1", OperationKind::Suspend, &json!({}))
            .await;
        let rejected = authority
            .execute("acct-2", OperationKind::Suspend, &json!({}))
            .await;

        assert!(ok.success);
        assert!(!rejected.success);
        assert_eq!(rejected.error_message(), "authority rejected acct-2");
        assert_eq!(authority.invocations(), vec!["acct-1", "acct-2"]);
    }

    #[tokio::test]
    async fn test_recording_resync_captures_keys() {
        let resync = RecordingResync::new();
        resync.resync(&account_ids(3)).await;

        assert_eq!(resync.call_count(), 1);
        assert_eq!(resync.calls()[0], account_ids(3));
    }
}
