//! Versioned in-memory snapshot cache for entity state.
//!
//! The store holds the client-visible copy of every entity the console knows
//! about, keyed by entity id. Every write bumps a per-key version counter,
//! which is what makes optimistic reverts safe: a revert only lands if the
//! key's version still matches the one captured at projection time, so a
//! concurrent writer can never be clobbered by a stale rollback.
//!
//! All mutations notify subscribers through a broadcast channel. The store
//! never blocks on slow subscribers; they observe `Lagged` per the channel's
//! semantics and are expected to re-read current state.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// A value held in the snapshot store.
///
/// `PendingDelete` is the typed tombstone written when a delete has been
/// requested but not yet confirmed by the authority. Keeping it a distinct
/// variant (rather than a flag inside the entity document) means consumers
/// cannot accidentally render a half-deleted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SnapshotValue {
    /// A live entity document
    Entity(serde_json::Value),
    /// Delete requested, awaiting authority confirmation
    PendingDelete,
}

impl SnapshotValue {
    /// Wrap an entity document
    pub fn entity(value: serde_json::Value) -> Self {
        Self::Entity(value)
    }

    /// Check if this value is the pending-delete tombstone
    pub fn is_pending_delete(&self) -> bool {
        matches!(self, Self::PendingDelete)
    }

    /// Borrow the entity document, if this is a live entity
    pub fn as_entity(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Entity(value) => Some(value),
            Self::PendingDelete => None,
        }
    }
}

/// A key's current value together with its version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub value: SnapshotValue,
    pub version: u64,
}

/// Change notifications emitted on every successful store mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// A key was written (unconditional set or winning compare-and-set)
    Updated {
        key: String,
        value: SnapshotValue,
        version: u64,
    },
    /// A key was removed from the store
    Removed { key: String },
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: SnapshotValue,
    version: u64,
}

/// Concurrent, versioned snapshot store.
///
/// Backed by a sharded map so unrelated keys never contend; the
/// compare-and-set runs under the key's shard lock, making it atomic with
/// respect to every other write path.
#[derive(Debug)]
pub struct SnapshotStore {
    entries: DashMap<String, StoredEntry>,
    events: broadcast::Sender<SnapshotEvent>,
}

impl SnapshotStore {
    /// Create a new store with the given notification channel capacity
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            entries: DashMap::new(),
            events,
        }
    }

    /// Get the current value for a key
    pub fn get(&self, key: &str) -> Option<SnapshotValue> {
        self.entries.get(key).map(|stored| stored.value.clone())
    }

    /// Get the current value and version for a key
    pub fn entry(&self, key: &str) -> Option<SnapshotEntry> {
        self.entries.get(key).map(|stored| SnapshotEntry {
            key: key.to_string(),
            value: stored.value.clone(),
            version: stored.version,
        })
    }

    /// Get the current version for a key
    pub fn version(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|stored| stored.version)
    }

    /// Unconditionally write a key, returning the new version.
    ///
    /// Versions start at 1 for a fresh key and increment on every write.
    /// This is the path used by optimistic projection and by authority
    /// resync; both are allowed to overwrite whatever is present.
    pub fn set(&self, key: impl Into<String>, value: SnapshotValue) -> u64 {
        let key = key.into();
        let version = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let stored = occupied.get_mut();
                stored.version += 1;
                stored.value = value.clone();
                stored.version
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredEntry {
                    value: value.clone(),
                    version: 1,
                });
                1
            }
        };

        trace!(key = %key, version, "Snapshot set");
        self.notify(SnapshotEvent::Updated {
            key,
            value,
            version,
        });
        version
    }

    /// Write a key only if its version still matches `expected_version`.
    ///
    /// Returns `true` if the write landed. Returns `false` on a version
    /// mismatch or when the key is absent; both mean someone else touched
    /// the key since the version was captured, and the caller's value is
    /// stale by definition.
    pub fn set_if_version(
        &self,
        key: &str,
        expected_version: u64,
        value: SnapshotValue,
    ) -> bool {
        let written = match self.entries.get_mut(key) {
            Some(mut stored) if stored.version == expected_version => {
                stored.version += 1;
                stored.value = value.clone();
                Some(stored.version)
            }
            _ => None,
        };

        match written {
            Some(version) => {
                trace!(key, expected_version, version, "Snapshot compare-and-set applied");
                self.notify(SnapshotEvent::Updated {
                    key: key.to_string(),
                    value,
                    version,
                });
                true
            }
            None => {
                trace!(key, expected_version, "Snapshot compare-and-set lost");
                false
            }
        }
    }

    /// Remove a key, returning its last value
    pub fn remove(&self, key: &str) -> Option<SnapshotValue> {
        let removed = self.entries.remove(key).map(|(_, stored)| stored.value);
        if removed.is_some() {
            self.notify(SnapshotEvent::Removed {
                key: key.to_string(),
            });
        }
        removed
    }

    /// Subscribe to store change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.events.subscribe()
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect the current key set
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|kv| kv.key().clone()).collect()
    }

    fn notify(&self, event: SnapshotEvent) {
        // send() errors when there are no subscribers; the store publishes
        // regardless of whether anyone is listening
        let _ = self.events.send(event);
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(1024)
    }
}
