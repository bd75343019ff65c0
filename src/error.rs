//! Error types for the batch mutation engine.
//!
//! Expected per-item failures are *data* (`ItemFailure` entries in progress
//! state and batch results), not errors. The variants here cover the cases
//! that abort or reject an entire batch, plus ambient configuration and
//! internal failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BatchOpsError {
    /// The permission gate denied the batch before any work started.
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// The job failed structural validation and was rejected synchronously.
    #[error("Malformed job: {reason}")]
    MalformedJob { reason: String },

    /// A job lifecycle transition that the state machine does not allow.
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure (task join errors, poisoned invariants).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchOpsError {
    /// Create a permission denial with the gate's stated reason.
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Create a malformed-job rejection.
    pub fn malformed_job(reason: impl Into<String>) -> Self {
        Self::MalformedJob {
            reason: reason.into(),
        }
    }

    /// True if this error was raised before any snapshot write or remote call.
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::MalformedJob { .. }
        )
    }
}

impl From<serde_json::Error> for BatchOpsError {
    fn from(error: serde_json::Error) -> Self {
        BatchOpsError::MalformedJob {
            reason: format!("JSON error: {error}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchOpsError>;
