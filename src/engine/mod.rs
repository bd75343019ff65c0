//! # Batch Mutation Engine
//!
//! The components that take a batch job from request to settlement:
//!
//! - **types**: jobs, outcomes, results, and the collaborator traits
//! - **projector**: pure computation of tentative snapshot values
//! - **progress**: concurrency-safe per-item and aggregate accounting
//! - **coordinator**: chunked execution with a barrier between chunks
//! - **reconciler**: the top-level validate/authorize/project/execute/settle
//!   flow, including rollback of failed items and the post-settlement resync

pub mod coordinator;
pub mod progress;
pub mod projector;
pub mod reconciler;
pub mod types;

// Re-export main types for convenient access
pub use coordinator::BatchCoordinator;
pub use progress::{ProgressState, ProgressTracker};
pub use projector::{OptimisticProjector, ProjectedChange};
pub use reconciler::ReconciliationManager;
pub use types::{
    AllowAllGate, AuthorizationDecision, BatchItem, BatchJob, BatchResult, ItemFailure,
    ItemStatus, MutationExecutor, MutationOutcome, NoopResync, OperationKind, PermissionGate,
    ResyncHandler,
};
