//! Configuration Loader
//!
//! Layers defaults, an optional config file, and `BATCHOPS_*` environment
//! variables into a validated [`BatchOpsConfig`].

use std::env;
use std::path::Path;
use tracing::debug;

use super::BatchOpsConfig;
use crate::error::{BatchOpsError, Result};

/// Environment variable naming a config file to layer over the defaults
pub const CONFIG_PATH_ENV: &str = "BATCHOPS_CONFIG_PATH";

/// Prefix for environment variable overrides
/// (`BATCHOPS_EXECUTION__CHUNK_SIZE=5` sets `execution.chunk_size`)
pub const ENV_PREFIX: &str = "BATCHOPS";

/// Loads and holds the engine configuration
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: BatchOpsConfig,
}

impl ConfigManager {
    /// Load configuration from defaults, the file named by
    /// `BATCHOPS_CONFIG_PATH` (if any), and `BATCHOPS_*` environment
    /// overrides
    pub fn load() -> Result<Self> {
        let file = env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(file.as_deref().map(Path::new))
    }

    /// Load configuration with an explicit (or absent) config file
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&BatchOpsConfig::default())
            .map_err(|e| BatchOpsError::Configuration(format!("invalid defaults: {e}")))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = file {
            debug!(path = %path.display(), "Layering config file");
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            // The prefix separator must be set explicitly: once a nesting
            // separator is configured it becomes the prefix separator too,
            // and only BATCHOPS__SECTION__KEY would match.
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder
            .build()
            .map_err(|e| BatchOpsError::Configuration(format!("failed to load config: {e}")))?;
        let config: BatchOpsConfig = merged
            .try_deserialize()
            .map_err(|e| BatchOpsError::Configuration(format!("failed to parse config: {e}")))?;

        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(Self { config })
    }

    /// Wrap an already-built configuration (programmatic setup and tests)
    pub fn from_config(config: BatchOpsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the loaded configuration
    pub fn config(&self) -> &BatchOpsConfig {
        &self.config
    }

    /// Consume the manager, yielding the configuration
    pub fn into_config(self) -> BatchOpsConfig {
        self.config
    }
}
