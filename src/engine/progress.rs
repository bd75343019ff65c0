//! # Progress Tracker
//!
//! Concurrency-safe per-batch progress accounting. Every chunk task reports
//! its settlement here, so the counters are the one place in the engine where
//! a lost update would silently corrupt user-visible numbers. All mutation
//! goes through a single mutex; the aggregate invariant
//! `completed + failed + in_flight == total` holds at every observable
//! instant, with `in_flight` counting items not yet settled.
//!
//! Observers either poll [`ProgressTracker::state`] or subscribe to the watch
//! channel, which carries the latest state after every settlement.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::warn;

use super::types::{BatchItem, ItemFailure, ItemStatus};
use crate::snapshot::SnapshotValue;

/// Aggregate progress counters for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items not yet settled (dispatched or still pending)
    pub in_flight: usize,
    pub errors: Vec<ItemFailure>,
}

impl ProgressState {
    /// Number of items that have settled, success or failure
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }

    /// Check if every item has settled
    pub fn is_settled(&self) -> bool {
        self.in_flight == 0
    }

    /// Completion percentage, derived from the counters
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.settled() as f64 / self.total as f64) * 100.0
    }
}

#[derive(Debug)]
struct ProgressInner {
    completed: usize,
    failed: usize,
    in_flight: usize,
    errors: Vec<ItemFailure>,
    items: HashMap<String, BatchItem>,
    /// Pre-batch snapshot values, primed at projection time
    originals: HashMap<String, SnapshotValue>,
}

/// Shared progress accounting for one batch run
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    inner: Mutex<ProgressInner>,
    state_tx: watch::Sender<ProgressState>,
}

impl ProgressTracker {
    /// Create a tracker for the given target ids, all starting `Pending`
    pub fn new(target_ids: &[String]) -> Self {
        let total = target_ids.len();
        let items = target_ids
            .iter()
            .map(|id| (id.clone(), BatchItem::pending(id.clone())))
            .collect();

        let initial = ProgressState {
            total,
            completed: 0,
            failed: 0,
            in_flight: total,
            errors: Vec::new(),
        };
        let (state_tx, _) = watch::channel(initial);

        Self {
            total,
            inner: Mutex::new(ProgressInner {
                completed: 0,
                failed: 0,
                in_flight: total,
                errors: Vec::new(),
                items,
                originals: HashMap::new(),
            }),
            state_tx,
        }
    }

    /// Total number of items in the batch
    pub fn total(&self) -> usize {
        self.total
    }

    /// Attach the pre-batch snapshot value for an id.
    ///
    /// Called once per projected id before execution starts, so failure
    /// entries can carry the value the item is rolled back to.
    pub fn prime_original(&self, id: &str, value: SnapshotValue) {
        let mut inner = self.inner.lock();
        inner.originals.insert(id.to_string(), value);
    }

    /// Mark pending items as dispatched.
    ///
    /// Only flips per-item status; the aggregate counters are untouched
    /// because `in_flight` already counts every unsettled item.
    pub fn mark_in_flight(&self, ids: &[String]) {
        let mut inner = self.inner.lock();
        for id in ids {
            if let Some(item) = inner.items.get_mut(id) {
                if item.status == ItemStatus::Pending {
                    item.status = ItemStatus::InFlight;
                }
            }
        }
    }

    /// Record one item's settlement.
    ///
    /// Exactly-once accounting: a report for an already-settled item is
    /// logged and dropped, so an at-least-once executor can never inflate
    /// the counters.
    pub fn record_settled(&self, id: &str, success: bool, error: Option<String>) {
        let mut inner = self.inner.lock();

        let Some(item) = inner.items.get_mut(id) else {
            warn!(item_id = %id, "Settlement reported for unknown item, ignoring");
            return;
        };
        if item.status.is_terminal() {
            warn!(
                item_id = %id,
                status = %item.status,
                "Duplicate settlement reported, ignoring"
            );
            return;
        }

        if success {
            item.status = ItemStatus::Succeeded;
            inner.completed += 1;
        } else {
            let message = error.unwrap_or_else(|| "unspecified failure".to_string());
            item.status = ItemStatus::Failed;
            item.error = Some(message.clone());
            let original_value = inner.originals.get(id).cloned();
            inner.errors.push(ItemFailure {
                id: id.to_string(),
                message,
                original_value,
            });
            inner.failed += 1;
        }
        inner.in_flight -= 1;

        // Publish while still holding the lock: a publish after unlock can
        // be overtaken by a concurrent settlement, leaving the watch channel
        // with an older state than the counters.
        let state = self.state_locked(&inner);
        self.state_tx.send_replace(state);
    }

    /// Current aggregate state
    pub fn state(&self) -> ProgressState {
        let inner = self.inner.lock();
        self.state_locked(&inner)
    }

    /// Current record for one item
    pub fn item(&self, id: &str) -> Option<BatchItem> {
        self.inner.lock().items.get(id).cloned()
    }

    /// The failure recorded for an id, if it failed
    pub fn failure_for(&self, id: &str) -> Option<ItemFailure> {
        let inner = self.inner.lock();
        inner.errors.iter().find(|f| f.id == id).cloned()
    }

    /// Subscribe to progress updates; the receiver always holds the latest
    /// state
    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.state_tx.subscribe()
    }

    fn state_locked(&self, inner: &ProgressInner) -> ProgressState {
        ProgressState {
            total: self.total,
            completed: inner.completed,
            failed: inner.failed,
            in_flight: inner.in_flight,
            errors: inner.errors.clone(),
        }
    }
}
