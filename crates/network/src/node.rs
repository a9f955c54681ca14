//! Endpoints and the consensus nodes they belong to.

use crate::{GrpcMethod, NodeChannel, NodeHealth, ResponseStream};
use lc_types::{AccountId, NodeAddress};
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tonic::Status;

/// One reachable address with its own health and channel.
pub struct Endpoint {
    /// The address the channel connects to.
    address: NodeAddress,
    /// Backoff state.
    health: NodeHealth,
    /// Transport.
    channel: Arc<dyn NodeChannel>,
    /// Time allowed for the channel to connect.
    connect_timeout: Duration,
}

impl Endpoint {
    /// Create a healthy endpoint.
    pub fn new(
        address: NodeAddress,
        channel: Arc<dyn NodeChannel>,
        health: NodeHealth,
        connect_timeout: Duration,
    ) -> Self {
        Self { address, health, channel, connect_timeout }
    }

    /// The endpoint address.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// The endpoint's backoff state.
    pub fn health(&self) -> &NodeHealth {
        &self.health
    }

    /// See [`NodeHealth::is_healthy`].
    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// See [`NodeHealth::remaining_backoff`].
    pub fn remaining_backoff(&self) -> Duration {
        self.health.remaining_backoff()
    }

    /// See [`NodeHealth::increase_backoff`].
    pub fn increase_backoff(&self) {
        self.health.increase_backoff();
    }

    /// See [`NodeHealth::decrease_backoff`].
    pub fn decrease_backoff(&self) {
        self.health.decrease_backoff();
    }

    /// Try to connect the channel. Returns `true` when the endpoint could not be reached.
    pub async fn channel_failed_to_connect(&self) -> bool {
        !self.channel.connect(self.connect_timeout).await
    }

    /// Submit a unary request.
    pub async fn submit(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, Status> {
        self.channel.unary(method, request, deadline).await
    }

    /// Open a server stream.
    pub async fn open_stream(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
    ) -> Result<ResponseStream, Status> {
        self.channel.server_streaming(method, request).await
    }

    /// Close the channel.
    pub fn close(&self) {
        self.channel.close();
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

/// A consensus node reached through one endpoint.
///
/// A node with several endpoints appears once per endpoint, all sharing the same account id.
/// Each of these is a proxy for the same node.
#[derive(Debug)]
pub struct Node {
    account_id: AccountId,
    endpoint: Endpoint,
}

impl Node {
    /// Create a node.
    pub fn new(account_id: AccountId, endpoint: Endpoint) -> Self {
        Self { account_id, endpoint }
    }

    /// The account that owns the node.
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// The endpoint this proxy uses.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The endpoint address.
    pub fn address(&self) -> &NodeAddress {
        self.endpoint.address()
    }

    /// The endpoint health.
    pub fn health(&self) -> &NodeHealth {
        self.endpoint.health()
    }

    /// See [`NodeHealth::is_healthy`].
    pub fn is_healthy(&self) -> bool {
        self.endpoint.is_healthy()
    }

    /// See [`NodeHealth::remaining_backoff`].
    pub fn remaining_backoff(&self) -> Duration {
        self.endpoint.remaining_backoff()
    }

    /// See [`NodeHealth::increase_backoff`].
    pub fn increase_backoff(&self) {
        self.endpoint.increase_backoff();
    }

    /// See [`NodeHealth::decrease_backoff`].
    pub fn decrease_backoff(&self) {
        self.endpoint.decrease_backoff();
    }

    /// See [`Endpoint::channel_failed_to_connect`].
    pub async fn channel_failed_to_connect(&self) -> bool {
        self.endpoint.channel_failed_to_connect().await
    }

    /// See [`Endpoint::submit`].
    pub async fn submit(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, Status> {
        self.endpoint.submit(method, request, deadline).await
    }

    /// Close the channel.
    pub fn close(&self) {
        self.endpoint.close();
    }
}
