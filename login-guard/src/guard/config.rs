//! Login guard configuration
//!
//! Failure threshold, lockout duration and identity provider timeout for the
//! [`LoginGuard`](super::LoginGuard). Passed to the guard at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Login guard configuration
///
/// # Example (config.toml)
///
/// ```toml
/// [guard]
/// failure_threshold = 5
/// lockout_duration_secs = 900
/// provider_timeout_ms = 5000
/// count_provider_errors_as_failure = true
/// warning_threshold = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct GuardConfig {
    /// Failed attempts that lock the account
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Duration in seconds that an account remains locked
    #[serde(default = "default_lockout_duration_secs")]
    pub lockout_duration_secs: u64,

    /// Timeout in milliseconds for a single identity provider call
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,

    /// Whether an unreachable or failing identity provider counts as a failed attempt
    #[serde(default = "default_true")]
    pub count_provider_errors_as_failure: bool,

    /// Failed attempts before an approaching-threshold notification
    ///
    /// 0 disables it, as does any value at or above `failure_threshold`.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,
}

impl GuardConfig {
    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }
        if self.lockout_duration_secs == 0 {
            return Err("lockout_duration_secs must be greater than 0".to_string());
        }
        if i64::try_from(self.lockout_duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .is_none()
        {
            return Err("lockout_duration_secs is out of range".to_string());
        }
        if self.provider_timeout_ms == 0 {
            return Err("provider_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Builder-style override of the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Builder-style override of the lockout duration
    pub fn with_lockout_duration_secs(mut self, secs: u64) -> Self {
        self.lockout_duration_secs = secs;
        self
    }

    /// Builder-style override of the provider timeout
    pub fn with_provider_timeout_ms(mut self, ms: u64) -> Self {
        self.provider_timeout_ms = ms;
        self
    }

    /// Builder-style override of the provider error policy
    pub fn with_count_provider_errors_as_failure(mut self, count: bool) -> Self {
        self.count_provider_errors_as_failure = count;
        self
    }

    /// Builder-style override of the warning threshold
    pub fn with_warning_threshold(mut self, threshold: u32) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Lockout duration as a timestamp offset
    pub fn lockout_duration(&self) -> chrono::Duration {
        // validate() rejects values that do not fit
        i64::try_from(self.lockout_duration_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Identity provider call timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            lockout_duration_secs: default_lockout_duration_secs(),
            provider_timeout_ms: default_provider_timeout_ms(),
            count_provider_errors_as_failure: true,
            warning_threshold: default_warning_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_lockout_duration_secs() -> u64 {
    900 // 15 minutes
}

fn default_provider_timeout_ms() -> u64 {
    5000
}

fn default_warning_threshold() -> u32 {
    3
}
