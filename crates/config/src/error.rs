//! Configuration errors.

use std::time::Duration;
use thiserror::Error;

/// Result alias for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid configuration. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A lower bound is greater than its upper bound.
    #[error("{name}: minimum {min:?} is greater than maximum {max:?}")]
    InvalidRange {
        /// The setting pair.
        name: &'static str,
        /// Configured lower bound.
        min: Duration,
        /// Configured upper bound.
        max: Duration,
    },
    /// A value that must be positive is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Ensure `min <= max` for a named duration pair.
pub(crate) fn check_range(name: &'static str, min: Duration, max: Duration) -> ConfigResult<()> {
    if min > max {
        return Err(ConfigError::InvalidRange { name, min, max });
    }
    Ok(())
}
