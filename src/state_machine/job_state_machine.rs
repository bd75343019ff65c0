use tracing::{debug, warn};
use uuid::Uuid;

use super::{events::JobEvent, states::JobState};
use crate::error::{BatchOpsError, Result};

/// In-memory state machine for a single batch job's lifecycle.
///
/// Jobs move strictly forward: `Created -> Projected -> Running -> Settled`.
/// There are no retry or reset paths; a job is created, driven to settlement
/// once, and discarded. Illegal transitions indicate an engine bug and are
/// rejected rather than silently absorbed.
#[derive(Debug)]
pub struct JobStateMachine {
    job_id: Uuid,
    current: JobState,
}

impl JobStateMachine {
    /// Create a new state machine for the given job, starting at `Created`
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            current: JobState::default(),
        }
    }

    /// Get the current state of the job
    pub fn current_state(&self) -> JobState {
        self.current
    }

    /// Attempt to transition the job state
    pub fn transition(&mut self, event: JobEvent) -> Result<JobState> {
        let target = self.determine_target_state(self.current, event)?;

        debug!(
            job_id = %self.job_id,
            from = %self.current,
            to = %target,
            event = event.event_type(),
            "Job state transition"
        );

        self.current = target;
        Ok(target)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(&self, current: JobState, event: JobEvent) -> Result<JobState> {
        let target = match (current, event) {
            (JobState::Created, JobEvent::Project) => JobState::Projected,
            (JobState::Projected, JobEvent::Launch) => JobState::Running,
            (JobState::Running, JobEvent::Settle) => JobState::Settled,

            // Invalid transitions
            (from, event) => {
                warn!(
                    job_id = %self.job_id,
                    from = %from,
                    event = event.event_type(),
                    "Rejected invalid job state transition"
                );
                return Err(BatchOpsError::InvalidTransition {
                    from: from.to_string(),
                    event: event.event_type().to_string(),
                });
            }
        };

        Ok(target)
    }
}
