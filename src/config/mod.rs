//! # BatchOps Configuration System
//!
//! Explicit, validated configuration for the engine. Values come from three
//! layers, later layers overriding earlier ones:
//!
//! 1. Built-in defaults (always complete; the engine runs with no file and
//!    no environment at all)
//! 2. An optional config file named by `BATCHOPS_CONFIG_PATH`
//! 3. `BATCHOPS_*` environment variables
//!    (e.g. `BATCHOPS_EXECUTION__CHUNK_SIZE=5`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batchops_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let chunk_size = manager.config().execution.chunk_size;
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::error::{BatchOpsError, Result};

pub use loader::ConfigManager;

/// Root configuration for the batch mutation engine
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchOpsConfig {
    /// Chunked execution settings
    pub execution: ExecutionConfig,

    /// Snapshot store settings
    pub snapshot: SnapshotConfig,

    /// Lifecycle event channel settings
    pub events: EventConfig,
}

impl BatchOpsConfig {
    /// Configuration preset for tests: identical execution semantics with
    /// a small target cap
    pub fn for_testing() -> Self {
        Self {
            execution: ExecutionConfig::for_testing(),
            snapshot: SnapshotConfig { event_capacity: 64 },
            events: EventConfig { capacity: 256 },
        }
    }

    /// Validate the loaded values; zero-size knobs would deadlock or
    /// silently drop work
    pub fn validate(&self) -> Result<()> {
        if self.execution.chunk_size == 0 {
            return Err(BatchOpsError::Configuration(
                "execution.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.execution.max_targets_per_job == 0 {
            return Err(BatchOpsError::Configuration(
                "execution.max_targets_per_job must be at least 1".to_string(),
            ));
        }
        if self.snapshot.event_capacity == 0 {
            return Err(BatchOpsError::Configuration(
                "snapshot.event_capacity must be at least 1".to_string(),
            ));
        }
        if self.events.capacity == 0 {
            return Err(BatchOpsError::Configuration(
                "events.capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chunked execution configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Items per chunk; also the engine's concurrency bound
    pub chunk_size: usize,

    /// Upper bound on a single job's target list
    pub max_targets_per_job: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 3,
            max_targets_per_job: 1000,
        }
    }
}

impl ExecutionConfig {
    /// Execution preset for tests
    pub fn for_testing() -> Self {
        Self {
            chunk_size: 3,
            max_targets_per_job: 100,
        }
    }
}

/// Snapshot store configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Capacity of the store's change notification channel
    pub event_capacity: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
        }
    }
}

/// Lifecycle event channel configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EventConfig {
    /// Capacity of the lifecycle event broadcast channel
    pub capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}
