//! Retry policy for request execution.

use crate::{check_range, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client-wide retry policy.
///
/// Every field can be overridden for a single call through [`ExecutionOverrides`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Submission attempts before giving up.
    pub max_attempts: u32,
    /// Starting delay after a busy response.
    #[serde(with = "humantime_serde")]
    pub min_backoff: Duration,
    /// Upper bound for the busy-response delay.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Overall time budget for one call, across all attempts.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Time budget for a single attempt against one node.
    #[serde(with = "humantime_serde")]
    pub grpc_deadline: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            request_timeout: Duration::from_secs(120),
            grpc_deadline: Duration::from_secs(10),
        }
    }
}

impl ExecutionConfig {
    /// Check bounds.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero("max_attempts"));
        }
        check_range("request backoff", self.min_backoff, self.max_backoff)
    }

    /// Apply per-call overrides on top of this policy.
    pub fn resolve(&self, overrides: &ExecutionOverrides) -> ConfigResult<ResolvedExecution> {
        let resolved = ResolvedExecution {
            max_attempts: overrides.max_attempts.unwrap_or(self.max_attempts),
            min_backoff: overrides.min_backoff.unwrap_or(self.min_backoff),
            max_backoff: overrides.max_backoff.unwrap_or(self.max_backoff),
            request_timeout: overrides.request_timeout.unwrap_or(self.request_timeout),
            grpc_deadline: overrides.grpc_deadline.unwrap_or(self.grpc_deadline),
        };

        if resolved.max_attempts == 0 {
            return Err(ConfigError::Zero("max_attempts"));
        }
        check_range("request backoff", resolved.min_backoff, resolved.max_backoff)?;
        Ok(resolved)
    }
}

/// Per-call values that take precedence over the client policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOverrides {
    /// See [`ExecutionConfig::max_attempts`].
    pub max_attempts: Option<u32>,
    /// See [`ExecutionConfig::min_backoff`].
    pub min_backoff: Option<Duration>,
    /// See [`ExecutionConfig::max_backoff`].
    pub max_backoff: Option<Duration>,
    /// See [`ExecutionConfig::request_timeout`].
    pub request_timeout: Option<Duration>,
    /// See [`ExecutionConfig::grpc_deadline`].
    pub grpc_deadline: Option<Duration>,
}

impl ExecutionOverrides {
    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the busy-response backoff bounds.
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = Some(min);
        self.max_backoff = Some(max);
        self
    }

    /// Set the overall call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the per-attempt deadline.
    pub fn with_grpc_deadline(mut self, deadline: Duration) -> Self {
        self.grpc_deadline = Some(deadline);
        self
    }
}

/// The effective policy for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedExecution {
    /// Submission attempts before giving up.
    pub max_attempts: u32,
    /// Starting delay after a busy response.
    pub min_backoff: Duration,
    /// Upper bound for the busy-response delay.
    pub max_backoff: Duration,
    /// Overall time budget.
    pub request_timeout: Duration,
    /// Per-attempt time budget.
    pub grpc_deadline: Duration,
}
