// State machine module for batch job lifecycles
//
// Jobs move through a strict forward-only lifecycle; every transition is
// validated here so the reconciliation flow cannot reach settlement logic
// from a half-initialized job.

pub mod events;
pub mod job_state_machine;
pub mod states;

// Re-export main types for convenient access
pub use events::JobEvent;
pub use job_state_machine::JobStateMachine;
pub use states::JobState;
