//! Configuration Module
//!
//! This module defines all configuration structures for the batcher.
//! Configuration is loaded from TOML files and parsed using serde.
//! Every section and field has a default, so an empty file is valid.

use crate::{BatchError, BatchLimits};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Main configuration structure
///
/// # Example TOML
/// ```toml
/// [limits]
/// max_record_size = 1048576
/// max_batch_size = 5242880
/// max_batch_count = 500
/// oversized = "discard"
///
/// [pipeline]
/// channel_capacity = 1024
/// linger_ms = 0
///
/// [logging]
/// filter = "info"
/// json = false
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-record and per-batch ceilings, sizes in bytes; see [`BatchLimits`]
    pub limits: BatchLimits,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Async pipeline settings
///
/// # Fields
/// - `channel_capacity`: Bound of the record and batch channels
/// - `linger_ms`: Flush a non-empty batch after this much idle time (0 disables)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub channel_capacity: usize,
    pub linger_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            linger_ms: 0,
        }
    }
}

/// Logging settings
///
/// `filter` uses `tracing_subscriber::EnvFilter` syntax; `RUST_LOG` wins when set.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Returns
    /// * `Ok(Config)` if the file was successfully loaded and parsed
    /// * `Err` if the file couldn't be read or the TOML is invalid
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Validated batch limits
    pub fn limits(&self) -> Result<BatchLimits, BatchError> {
        self.limits.validate()?;
        Ok(self.limits)
    }
}
