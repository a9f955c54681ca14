//! Configuration for consensus node health and selection.

use crate::{check_range, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Node health and selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Backoff applied to a node after its first failure.
    #[serde(with = "humantime_serde")]
    pub min_node_backoff: Duration,
    /// Upper bound for node backoff.
    #[serde(with = "humantime_serde")]
    pub max_node_backoff: Duration,
    /// Failures after which a node is removed from the network. `None` never evicts.
    pub max_node_attempts: Option<u32>,
    /// Lower bound of the window between readmission sweeps.
    #[serde(with = "humantime_serde")]
    pub min_readmit_time: Duration,
    /// Upper bound of the window between readmission sweeps.
    #[serde(with = "humantime_serde")]
    pub max_readmit_time: Duration,
    /// Nodes chosen for a request that names none. `None` uses a third of the network.
    pub max_nodes_per_request: Option<usize>,
    /// Time allowed for a node's channel to connect.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            min_node_backoff: Duration::from_secs(8),
            max_node_backoff: Duration::from_secs(60 * 60),
            max_node_attempts: None,
            min_readmit_time: Duration::from_secs(8),
            max_readmit_time: Duration::from_secs(60 * 60),
            max_nodes_per_request: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl NetworkConfig {
    /// Check bounds.
    pub fn validate(&self) -> ConfigResult<()> {
        check_range("node backoff", self.min_node_backoff, self.max_node_backoff)?;
        check_range("node readmit time", self.min_readmit_time, self.max_readmit_time)
    }

    /// Number of nodes picked for a request against a network of `size` nodes.
    pub fn nodes_per_request(&self, size: usize) -> usize {
        self.max_nodes_per_request.unwrap_or_else(|| size.div_ceil(3)).max(1)
    }
}
