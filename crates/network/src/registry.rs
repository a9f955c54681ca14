//! Registry of consensus nodes.
//!
//! Nodes are held as shared handles. The set of nodes changes only through [`Network::admit`],
//! [`Network::evict`] and [`Network::set_network`]. Requests in flight keep the handles they
//! already resolved.

use crate::{Connector, Endpoint, NetworkError, NetworkResult, Node, NodeHealth};
use lc_config::NetworkConfig;
use lc_types::{AccountId, NodeAddress};
use parking_lot::RwLock;
use rand::seq::{IndexedRandom as _, SliceRandom as _};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The consensus nodes known to a client.
#[derive(Debug)]
pub struct Network {
    /// Health and selection policy.
    config: NetworkConfig,
    /// Creates channels for admitted endpoints.
    connector: Arc<dyn Connector>,
    /// Node handles and the healthy set.
    inner: RwLock<NetworkInner>,
}

#[derive(Debug)]
struct NetworkInner {
    /// Every proxy of every node, in admission order.
    nodes: Vec<Arc<Node>>,
    /// Proxies grouped by owning account.
    by_account: HashMap<AccountId, Vec<Arc<Node>>>,
    /// Proxies eligible for selection. Entries whose backoff has not elapsed are pruned lazily.
    healthy: Vec<Arc<Node>>,
    /// Next time a readmission sweep is allowed.
    earliest_readmit_time: Instant,
}

impl NetworkInner {
    fn rebuild_index(&mut self) {
        self.by_account.clear();
        for node in &self.nodes {
            self.by_account.entry(node.account_id()).or_default().push(node.clone());
        }
        self.healthy.retain(|node| self.nodes.iter().any(|n| Arc::ptr_eq(n, node)));
    }
}

impl Network {
    /// Create an empty network.
    pub fn new(config: NetworkConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            inner: RwLock::new(NetworkInner {
                nodes: Vec::new(),
                by_account: HashMap::new(),
                healthy: Vec::new(),
                earliest_readmit_time: Instant::now(),
            }),
        }
    }

    /// Create a network from an address to account map.
    pub fn from_map(
        map: &BTreeMap<NodeAddress, AccountId>,
        config: NetworkConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let network = Self::new(config, connector);
        network.set_network(map);
        network
    }

    /// The health and selection policy.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn new_node(&self, address: NodeAddress, account_id: AccountId) -> Arc<Node> {
        let channel = self.connector.channel(&address);
        let health = NodeHealth::new(self.config.min_node_backoff, self.config.max_node_backoff);
        Arc::new(Node::new(account_id, Endpoint::new(address, channel, health, self.config.connect_timeout)))
    }

    /// Add one proxy for `account_id`. Admitting an address that is already known replaces it.
    pub fn admit(&self, address: NodeAddress, account_id: AccountId) -> Arc<Node> {
        let node = self.new_node(address, account_id);
        let mut inner = self.inner.write();
        if let Some(pos) = inner.nodes.iter().position(|n| n.address() == node.address()) {
            let old = inner.nodes.remove(pos);
            old.close();
        }
        inner.nodes.push(node.clone());
        inner.healthy.push(node.clone());
        inner.rebuild_index();
        info!(target: "network", %account_id, address=%node.address(), "node admitted");
        node
    }

    /// Remove the proxy at `address`. Returns `true` if it was present.
    pub fn evict(&self, address: &NodeAddress) -> bool {
        let mut inner = self.inner.write();
        let Some(pos) = inner.nodes.iter().position(|n| n.address() == address) else {
            return false;
        };
        let node = inner.nodes.remove(pos);
        node.close();
        inner.rebuild_index();
        info!(target: "network", account_id=%node.account_id(), %address, "node evicted");
        true
    }

    /// Replace the node set.
    ///
    /// Proxies present in both the old and new map keep their channel and health. Removed
    /// proxies are closed.
    pub fn set_network(&self, map: &BTreeMap<NodeAddress, AccountId>) {
        let mut inner = self.inner.write();
        let mut kept = Vec::with_capacity(map.len());
        let mut closed = 0usize;

        for node in inner.nodes.drain(..) {
            if map.get(node.address()) == Some(&node.account_id()) {
                kept.push(node);
            } else {
                node.close();
                closed += 1;
            }
        }

        let known: HashSet<_> = kept.iter().map(|n| n.address().clone()).collect();
        for (address, account_id) in map {
            if !known.contains(address) {
                let node = self.new_node(address.clone(), *account_id);
                inner.healthy.push(node.clone());
                kept.push(node);
            }
        }

        inner.nodes = kept;
        inner.rebuild_index();
        info!(target: "network", nodes=inner.nodes.len(), closed, "network updated");
    }

    /// Every proxy, in admission order.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.inner.read().nodes.clone()
    }

    /// Distinct node accounts.
    pub fn node_account_ids(&self) -> Vec<AccountId> {
        let inner = self.inner.read();
        let mut ids: Vec<_> = inner.by_account.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of proxies.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Whether the network is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().nodes.is_empty()
    }

    /// Return nodes whose backoff elapsed to the healthy set.
    ///
    /// Sweeps run at most once per readmit window. The next window opens at the earliest node
    /// readmit time, clamped to `[min_readmit_time, max_readmit_time]` from now.
    pub fn readmit_nodes(&self) {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if inner.earliest_readmit_time > now {
            return;
        }

        let max_next = now + self.config.max_readmit_time;
        let min_next = now + self.config.min_readmit_time;
        let next = inner
            .nodes
            .iter()
            .map(|node| node.health().readmit_time())
            .filter(|readmit| *readmit > now)
            .min()
            .unwrap_or(max_next);
        inner.earliest_readmit_time = next.max(min_next).min(max_next);

        let NetworkInner { nodes, healthy, .. } = &mut *inner;
        for node in nodes.iter() {
            if node.is_healthy() && !healthy.iter().any(|h| Arc::ptr_eq(h, node)) {
                debug!(target: "network", account_id=%node.account_id(), address=%node.address(), "node readmitted");
                healthy.push(node.clone());
            }
        }
    }

    /// Evict proxies whose failures reached `max_node_attempts`.
    fn evict_bad_nodes(&self) {
        let Some(limit) = self.config.max_node_attempts.filter(|limit| *limit > 0) else {
            return;
        };

        let mut inner = self.inner.write();
        let before = inner.nodes.len();
        inner.nodes.retain(|node| {
            let bad = node.health().bad_attempts();
            if bad >= limit {
                warn!(target: "network", account_id=%node.account_id(), address=%node.address(), bad, "evicting node after repeated failures");
                node.close();
                false
            } else {
                true
            }
        });
        if inner.nodes.len() != before {
            inner.rebuild_index();
        }
    }

    /// Choose target nodes for a request that names none.
    ///
    /// Picks `max_nodes_per_request` (default a third of the network) distinct healthy nodes at
    /// random. Waits for the earliest readmission when no node is healthy.
    pub async fn node_account_ids_for_execute(&self) -> NetworkResult<Vec<AccountId>> {
        self.evict_bad_nodes();

        loop {
            self.readmit_nodes();

            let wait_until = {
                let mut inner = self.inner.write();
                if inner.nodes.is_empty() {
                    return Err(NetworkError::EmptyNetwork);
                }

                inner.healthy.retain(|node| node.is_healthy());
                if !inner.healthy.is_empty() {
                    let count = self.config.nodes_per_request(inner.by_account.len());
                    let mut accounts: Vec<_> = inner
                        .healthy
                        .iter()
                        .map(|node| node.account_id())
                        .collect::<HashSet<_>>()
                        .into_iter()
                        .collect();
                    accounts.shuffle(&mut rand::rng());
                    accounts.truncate(count);
                    debug!(target: "network", ?accounts, "selected nodes for request");
                    return Ok(accounts);
                }

                inner.earliest_readmit_time
            };

            debug!(target: "network", "no healthy nodes, waiting for readmission");
            tokio::time::sleep_until(wait_until).await;
        }
    }

    /// All proxies of `account_id`.
    pub fn node_proxies(&self, account_id: AccountId) -> NetworkResult<Vec<Arc<Node>>> {
        self.readmit_nodes();
        self.inner
            .read()
            .by_account
            .get(&account_id)
            .cloned()
            .ok_or(NetworkError::UnknownNode(account_id))
    }

    /// Resolve target accounts to the proxies a request should try.
    ///
    /// A single account resolves to all of its proxies, so a dead proxy does not fail the call.
    /// Several accounts resolve to one random proxy each, so failover crosses distinct nodes.
    pub fn nodes_for(&self, account_ids: &[AccountId]) -> NetworkResult<Vec<Arc<Node>>> {
        match account_ids {
            [] => Err(NetworkError::NoNodeAccountIds),
            [account_id] => self.node_proxies(*account_id),
            many => {
                self.readmit_nodes();
                let inner = self.inner.read();
                let mut rng = rand::rng();
                many.iter()
                    .map(|account_id| {
                        inner
                            .by_account
                            .get(account_id)
                            .and_then(|proxies| proxies.choose(&mut rng))
                            .cloned()
                            .ok_or(NetworkError::UnknownNode(*account_id))
                    })
                    .collect()
            }
        }
    }

    /// Close every channel.
    pub fn close(&self) {
        for node in self.inner.read().nodes.iter() {
            node.close();
        }
    }
}
