//! Roller configuration
//!
//! The backoff parameters, the overall operation timeout and the readiness
//! poll interval are deliberately configuration rather than constants: only
//! the cap/timeout semantics are fixed by the algorithm.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Retry-delay sequence parameters, one fresh sequence per pod per pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackOffConfig {
    /// Delay before the second retry; the first retry is immediate
    pub first_delay_ms: u64,
    /// Exponential growth factor between consecutive delays
    pub multiplier: u32,
    /// Total number of delays before the sequence is exhausted
    pub max_attempts: u32,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
}

impl Default for BackOffConfig {
    fn default() -> Self {
        Self {
            first_delay_ms: 250,
            multiplier: 2,
            max_attempts: 6,
            max_delay_ms: 30_000,
        }
    }
}

/// Configuration for a rolling-restart pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RollerConfig {
    /// Overall budget for one rolling_restart call; readiness waits use
    /// whatever remains of it, they never restart it
    pub operation_timeout_ms: u64,
    /// Interval between pod readiness checks
    pub readiness_poll_interval_ms: u64,
    /// Per-pod retry backoff
    pub backoff: BackOffConfig,
}

impl Default for RollerConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 300_000,
            readiness_poll_interval_ms: 1_000,
            backoff: BackOffConfig::default(),
        }
    }
}

impl RollerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: RollerConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout_ms == 0 {
            return Err(Error::config("operationTimeoutMs must be greater than zero"));
        }
        if self.readiness_poll_interval_ms == 0 {
            return Err(Error::config(
                "readinessPollIntervalMs must be greater than zero",
            ));
        }
        if self.backoff.max_attempts == 0 {
            return Err(Error::config("backoff.maxAttempts must be greater than zero"));
        }
        if self.backoff.multiplier < 1 {
            return Err(Error::config("backoff.multiplier must be at least 1"));
        }
        if self.backoff.max_delay_ms < self.backoff.first_delay_ms {
            return Err(Error::config(
                "backoff.maxDelayMs must not be smaller than backoff.firstDelayMs",
            ));
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_interval_ms)
    }
}
