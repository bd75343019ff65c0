// Snapshot cache module
//
// The versioned entity cache that optimistic projection writes into and
// reconciliation reverts against.

pub mod store;

pub use store::{SnapshotEntry, SnapshotEvent, SnapshotStore, SnapshotValue};
