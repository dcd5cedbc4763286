//! Per-invocation timeout settings.
//!
//! - `timeout_ms`: hard deadline for one tool run (default 30 000)
//! - `reap_timeout_ms`: how long to wait for a killed tool to be reaped
//!   (default 5 000)
//!
//! Once a deadline fires the tool's whole process tree is killed. There is no
//! extension and no retry.

use std::time::Duration;

use toolsweep_runner::RunLimits;

/// Upper bound for `timeout_ms` (one day).
pub const MAX_TIMEOUT_MS: u64 = 86_400_000;

/// Upper bound for `reap_timeout_ms`.
pub const MAX_REAP_TIMEOUT_MS: u64 = 60_000;

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Deadline per invocation in milliseconds
    pub timeout_ms: u64,

    /// Post-kill reap bound in milliseconds
    pub reap_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            reap_timeout_ms: 5_000,
        }
    }
}

impl TimeoutConfig {
    /// Validate bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(TimeoutValidationError::TimeoutOutOfBounds {
                value: self.timeout_ms,
            });
        }

        if self.reap_timeout_ms == 0 || self.reap_timeout_ms > MAX_REAP_TIMEOUT_MS {
            return Err(TimeoutValidationError::ReapOutOfBounds {
                value: self.reap_timeout_ms,
            });
        }

        Ok(())
    }

    /// Fill unset values from defaults
    pub fn from_config(timeout_ms: Option<u64>, reap_timeout_ms: Option<u64>) -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: timeout_ms.unwrap_or(defaults.timeout_ms),
            reap_timeout_ms: reap_timeout_ms.unwrap_or(defaults.reap_timeout_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }

    /// Limits handed to the process runner
    pub fn limits(&self) -> RunLimits {
        RunLimits {
            timeout: self.timeout(),
            reap_timeout: self.reap_timeout(),
        }
    }

    /// The fixed error signature for a timed-out invocation.
    pub fn signature(&self) -> String {
        format!("Timeout after {} seconds", self.timeout().as_secs_f64())
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("timeout_ms must be in (0, 86400000], got {value}")]
    TimeoutOutOfBounds { value: u64 },

    #[error("reap_timeout_ms must be in (0, 60000], got {value}")]
    ReapOutOfBounds { value: u64 },
}
