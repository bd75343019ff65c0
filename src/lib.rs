#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # BatchOps Core
//!
//! High-performance Rust core for administrative batch mutations: apply one
//! operation (suspend, reactivate, role change, delete) to many target
//! entities with bounded concurrency, optimistic UI updates, per-item
//! progress, and automatic reconciliation on partial failure.
//!
//! ## Overview
//!
//! Admin consoles that mutate hundreds of accounts at once need a hard bound
//! on concurrent calls against the authority, and they need a client cache
//! that reflects the intended result immediately but rolls back precisely on
//! failure. This crate packages that engine behind small traits so the remote
//! call itself, the permission check, and the post-settlement refresh stay in
//! the embedding application.
//!
//! ## Architecture
//!
//! A batch job flows through a strict lifecycle:
//!
//! 1. **Validate**: structural checks reject malformed jobs synchronously
//! 2. **Authorize**: one [`engine::PermissionGate`] decision; a denial
//!    aborts with zero side effects
//! 3. **Project**: the [`engine::OptimisticProjector`] computes tentative
//!    values, which are written to the [`snapshot::SnapshotStore`] with
//!    their versions captured
//! 4. **Execute**: the [`engine::BatchCoordinator`] runs fixed-size chunks
//!    concurrently with a barrier between chunks; failures never abort
//!    siblings
//! 5. **Settle**: failed items are rolled back via compare-and-set (a lost
//!    set means a concurrent writer wins), then the resync hook refreshes
//!    every target from the authority
//!
//! ## Key Features
//!
//! - **Versioned snapshot cache**: per-key versions make rollback safe under
//!   concurrent writers
//! - **Chunked execution**: the chunk size is the concurrency bound; the
//!   barrier between chunks bounds authority load
//! - **Exact progress accounting**: `completed + failed + in_flight == total`
//!   at every observable instant
//! - **Failure isolation**: per-item failures are data, not errors; one bad
//!   item never poisons a batch
//! - **Typed lifecycle events**: UI layers subscribe to a broadcast stream
//!   of chunk and settlement events
//!
//! ## Module Organization
//!
//! - [`engine`] - Projection, progress, chunked execution, reconciliation
//! - [`snapshot`] - Versioned entity cache with change notifications
//! - [`state_machine`] - Batch job lifecycle management
//! - [`events`] - Lifecycle event publishing
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use batchops_core::config::BatchOpsConfig;
//! use batchops_core::engine::{
//!     AllowAllGate, BatchJob, MutationExecutor, MutationOutcome, NoopResync, OperationKind,
//!     ReconciliationManager,
//! };
//! use batchops_core::snapshot::{SnapshotStore, SnapshotValue};
//!
//! struct ApiExecutor;
//!
//! #[async_trait::async_trait]
//! impl MutationExecutor for ApiExecutor {
//!     async fn execute(
//!         &self,
//!         id: &str,
//!         _operation: OperationKind,
//!         _parameters: &serde_json::Value,
//!     ) -> MutationOutcome {
//!         // Call the real backend here
//!         println!("suspending {id}");
//!         MutationOutcome::ok()
//!     }
//! }
//!
//! # async fn example() -> batchops_core::error::Result<()> {
//! batchops_core::logging::init_structured_logging();
//!
//! let store = Arc::new(SnapshotStore::default());
//! store.set("user-1", SnapshotValue::entity(json!({ "active": true })));
//!
//! let manager = ReconciliationManager::new(
//!     Arc::clone(&store),
//!     Arc::new(AllowAllGate),
//!     Arc::new(NoopResync),
//!     BatchOpsConfig::default(),
//! );
//!
//! let job = BatchJob::new(
//!     OperationKind::Suspend,
//!     vec!["user-1".to_string()],
//!     json!({ "reason": "offboarding" }),
//! );
//! let result = manager.run_batch(job, Arc::new(ApiExecutor)).await?;
//! assert!(result.overall_success);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod snapshot;
pub mod state_machine;

pub use config::{BatchOpsConfig, ConfigManager, EventConfig, ExecutionConfig, SnapshotConfig};
pub use engine::{
    BatchCoordinator, BatchItem, BatchJob, BatchResult, ItemFailure, ItemStatus,
    MutationExecutor, MutationOutcome, OperationKind, OptimisticProjector, PermissionGate,
    ProgressState, ProgressTracker, ReconciliationManager, ResyncHandler,
};
pub use error::{BatchOpsError, Result};
pub use events::{BatchEvent, EventPublisher};
pub use snapshot::{SnapshotEntry, SnapshotEvent, SnapshotStore, SnapshotValue};
pub use state_machine::{JobEvent, JobState, JobStateMachine};
