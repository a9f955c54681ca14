//! Mirror node endpoints used for streaming subscriptions.

use crate::{Connector, Endpoint, NetworkError, NetworkResult, NodeHealth};
use lc_config::NetworkConfig;
use lc_types::NodeAddress;
use parking_lot::RwLock;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info};

/// Mirror endpoints, tried round-robin.
#[derive(Debug)]
pub struct MirrorNetwork {
    config: NetworkConfig,
    connector: Arc<dyn Connector>,
    endpoints: RwLock<Vec<Arc<Endpoint>>>,
    /// Index of the next endpoint to try.
    next: AtomicUsize,
}

impl MirrorNetwork {
    /// Create a mirror network. Each endpoint connects within `connect_timeout`.
    pub fn new(
        addresses: &[NodeAddress],
        config: NetworkConfig,
        connect_timeout: Duration,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let config = NetworkConfig { connect_timeout, ..config };
        let network =
            Self { config, connector, endpoints: RwLock::new(Vec::new()), next: AtomicUsize::new(0) };
        network.set_network(addresses);
        network
    }

    /// Replace the endpoint list, keeping endpoints whose address is unchanged.
    pub fn set_network(&self, addresses: &[NodeAddress]) {
        let mut endpoints = self.endpoints.write();
        let mut updated = Vec::with_capacity(addresses.len());
        for address in addresses {
            match endpoints.iter().position(|e| e.address() == address) {
                Some(pos) => updated.push(endpoints.remove(pos)),
                None => {
                    let channel = self.connector.channel(address);
                    let health =
                        NodeHealth::new(self.config.min_node_backoff, self.config.max_node_backoff);
                    updated.push(Arc::new(Endpoint::new(
                        address.clone(),
                        channel,
                        health,
                        self.config.connect_timeout,
                    )));
                }
            }
        }
        for removed in endpoints.drain(..) {
            removed.close();
        }
        *endpoints = updated;
        info!(target: "mirror", endpoints=endpoints.len(), "mirror network updated");
    }

    /// Every endpoint.
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.read().clone()
    }

    /// Whether any endpoint is configured.
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// The next endpoint in rotation.
    pub fn next_endpoint(&self) -> Option<Arc<Endpoint>> {
        let endpoints = self.endpoints.read();
        if endpoints.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % endpoints.len();
        Some(endpoints[index].clone())
    }

    /// Rotate through the endpoints until one connects.
    ///
    /// Endpoints still in backoff are skipped. A failed connect increases that endpoint's
    /// backoff. After one full rotation without success, returns
    /// [`NetworkError::MirrorUnavailable`] with the smallest remaining backoff so the caller can
    /// decide whether to wait and try again.
    pub async fn connected_endpoint(&self) -> NetworkResult<Arc<Endpoint>> {
        let rotation = self.endpoints.read().len();
        if rotation == 0 {
            return Err(NetworkError::EmptyNetwork);
        }

        for _ in 0..rotation {
            let Some(endpoint) = self.next_endpoint() else {
                break;
            };
            if !endpoint.is_healthy() {
                continue;
            }
            if endpoint.channel_failed_to_connect().await {
                debug!(target: "mirror", address=%endpoint.address(), "mirror endpoint failed to connect");
                endpoint.increase_backoff();
                continue;
            }
            endpoint.decrease_backoff();
            return Ok(endpoint);
        }

        let retry_after = self
            .endpoints
            .read()
            .iter()
            .map(|e| e.remaining_backoff())
            .min()
            .unwrap_or(Duration::ZERO);
        Err(NetworkError::MirrorUnavailable { retry_after })
    }

    /// Close every channel.
    pub fn close(&self) {
        for endpoint in self.endpoints.read().iter() {
            endpoint.close();
        }
    }
}
