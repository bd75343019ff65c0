use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states for a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Job accepted and validated, nothing applied yet
    Created,
    /// Tentative values written to the snapshot store
    Projected,
    /// Chunked execution in progress
    Running,
    /// All items settled, store reconciled, resync issued
    Settled,
}

impl JobState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled)
    }

    /// Check if this is an active state (remote mutations may be in flight)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if tentative writes from this job may be present in the store
    pub fn has_applied_writes(&self) -> bool {
        matches!(self, Self::Projected | Self::Running | Self::Settled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Projected => write!(f, "projected"),
            Self::Running => write!(f, "running"),
            Self::Settled => write!(f, "settled"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "projected" => Ok(Self::Projected),
            "running" => Ok(Self::Running),
            "settled" => Ok(Self::Settled),
            _ => Err(format!("Invalid job state: {s}")),
        }
    }
}

/// Default state for new jobs
impl Default for JobState {
    fn default() -> Self {
        Self::Created
    }
}
