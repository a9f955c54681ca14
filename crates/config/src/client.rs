//! Top level client configuration.

use crate::{ChunkConfig, ConfigResult, ExecutionConfig, NetworkConfig, SubscriptionConfig};
use eyre::WrapErr as _;
use lc_types::{AccountId, NodeAddress};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::debug;

/// Everything a client needs to reach a network.
///
/// ```yaml
/// network:
///   "127.0.0.1:50211": "0.0.3"
/// mirror_network:
///   - "127.0.0.1:5600"
/// execution:
///   max_attempts: 5
///   min_backoff: 100ms
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Consensus node endpoints and the account each belongs to.
    ///
    /// Several endpoints may map to the same account.
    pub network: BTreeMap<NodeAddress, AccountId>,
    /// Mirror node endpoints used for subscriptions.
    pub mirror_network: Vec<NodeAddress>,
    /// Request retry policy.
    pub execution: ExecutionConfig,
    /// Node health policy.
    pub node: NetworkConfig,
    /// Chunking limits.
    pub chunking: ChunkConfig,
    /// Subscription reconnect policy.
    pub subscription: SubscriptionConfig,
}

impl ClientConfig {
    /// Parse and validate a yaml document.
    pub fn from_yaml_str(yaml: &str) -> eyre::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).wrap_err("invalid client config yaml")?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a yaml file.
    pub fn load_from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        debug!(target: "config", ?path, "loading client config");
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read client config {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .wrap_err_with(|| format!("failed to load client config {}", path.display()))
    }

    /// Write this config as yaml.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> eyre::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), yaml)?;
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.execution.validate()?;
        self.node.validate()?;
        self.chunking.validate()?;
        self.subscription.validate()
    }
}
