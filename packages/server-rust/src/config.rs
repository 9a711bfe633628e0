//! Runtime configuration for the site planner.
//!
//! Every section has a `Default`; a JSON document only needs the keys it
//! overrides. CLI flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use siteplan_core::EstimationConfig;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Output format for the tracing subscriber installed by the binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SitePlannerConfig {
    /// Label attached to lifecycle log events.
    pub node_name: String,
    /// Estimation formula constants.
    pub estimation: EstimationConfig,
    /// Extra budget fraction reserved for high-priority operations.
    pub contingency_rate: f64,
    /// Resolve every registered descriptor during service init.
    pub warm_metadata_cache: bool,
    pub simulation: SimulationConfig,
    pub log_format: LogFormat,
}

impl Default for SitePlannerConfig {
    fn default() -> Self {
        Self {
            node_name: "siteplan".to_string(),
            estimation: EstimationConfig::default(),
            contingency_rate: 0.2,
            warm_metadata_cache: false,
            simulation: SimulationConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl SitePlannerConfig {
    /// Parses a JSON document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`SitePlannerConfig::from_json_str`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let est = &self.estimation;
        if est.min_team_size == 0 {
            return Err(invalid("estimation.minTeamSize must be at least 1"));
        }
        if !(est.budget_ceiling.is_finite() && est.budget_ceiling > 0.0) {
            return Err(invalid("estimation.budgetCeiling must be a positive number"));
        }
        if !(est.area_divisor.is_finite() && est.area_divisor > 0.0) {
            return Err(invalid("estimation.areaDivisor must be a positive number"));
        }
        if !(self.contingency_rate.is_finite() && self.contingency_rate >= 0.0) {
            return Err(invalid("contingencyRate must be a non-negative number"));
        }
        if self.simulation.checkpoint_timeout_ms == 0 {
            return Err(invalid("simulation.checkpointTimeoutMs must be greater than 0"));
        }
        Ok(())
    }
}

/// Settings for the concurrent site simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Pause between simulated work phases.
    pub phase_delay_ms: u64,
    /// Maximum time a site waits at the shared checkpoint.
    pub checkpoint_timeout_ms: u64,
    /// Hours used for the per-team payroll figure.
    pub payroll_hours: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            phase_delay_ms: 50,
            checkpoint_timeout_ms: 5_000,
            payroll_hours: 160,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn phase_delay(&self) -> Duration {
        Duration::from_millis(self.phase_delay_ms)
    }

    #[must_use]
    pub fn checkpoint_timeout(&self) -> Duration {
        Duration::from_millis(self.checkpoint_timeout_ms)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}
