//! Configuration for mirror node subscriptions.

use crate::{check_range, ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnect policy for topic subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Total connection attempts before the subscription fails.
    pub max_attempts: u32,
    /// Delay before the first reconnect.
    #[serde(with = "humantime_serde")]
    pub min_backoff: Duration,
    /// Upper bound for the reconnect delay.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Time allowed for one mirror endpoint to connect.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            min_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(1),
        }
    }
}

impl SubscriptionConfig {
    /// Check bounds.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero("subscription.max_attempts"));
        }
        check_range("subscription backoff", self.min_backoff, self.max_backoff)
    }
}
