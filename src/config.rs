//! Run configuration.
//!
//! Trial-count clamping lives here rather than in the session runner:
//! the runner accepts any positive count, and the minimum session size
//! is a caller policy.

use crate::entropy::{FallbackPolicy, DEFAULT_CHUNK_SIZE};
use crate::session::DEFAULT_CHECKPOINT_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which sessions to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Focus,
    Control,
    /// Focus, then Control, then a two-sample comparison.
    #[default]
    Compare,
}

/// Settings for a flip run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Trials per session.
    pub trials: u64,
    /// Smallest session size the CLI will start.
    pub min_trials: u64,
    /// Bytes drawn from the entropy source per refill.
    pub chunk_size: usize,
    /// Trials between progress/cancellation checkpoints.
    pub checkpoint_interval: u64,
    /// Significance level for reported verdicts.
    pub alpha: f64,
    pub mode: RunMode,
    pub fallback: FallbackPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trials: 100_000,
            min_trials: 50,
            chunk_size: DEFAULT_CHUNK_SIZE,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            alpha: 0.05,
            mode: RunMode::Compare,
            fallback: FallbackPolicy::Deny,
        }
    }
}

impl RunConfig {
    /// Raises `requested` to `min_trials`.
    pub fn clamp_trials(&self, requested: u64) -> u64 {
        let clamped = requested.max(self.min_trials);
        if clamped != requested {
            tracing::info!(requested, clamped, "Trial count raised to minimum");
        }
        clamped
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 || self.min_trials == 0 {
            return Err(ConfigError::InvalidTrials);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::InvalidCheckpointInterval);
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid trial count (must be at least 1)")]
    InvalidTrials,
    #[error("invalid chunk size (must be at least 1 byte)")]
    InvalidChunkSize,
    #[error("invalid checkpoint interval (must be at least 1)")]
    InvalidCheckpointInterval,
    #[error("invalid significance level {0} (must be in (0, 1))")]
    InvalidAlpha(f64),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print results as TOML instead of text.
    pub toml: bool,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.run.validate()?;
        Ok(config)
    }
}
