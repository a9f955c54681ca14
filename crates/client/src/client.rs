//! The client facade.

use bytes::Bytes;
use lc_config::{ClientConfig, ConfigResult};
use lc_executor::{
    ChunkBuilder, ChunkedTransaction, Dispatcher, ExecuteResult, Executable, Operator,
};
use lc_network::{Connector, GrpcConnector, MirrorNetwork, Network};
use lc_subscription::{SubscriptionHandle, SubscriptionResult, TopicMessageCodec, TopicMessageQuery};
use lc_types::{AccountId, NodeAddress, Signer, TransactionResponse};
use parking_lot::RwLock;
use std::{collections::BTreeMap, path::Path, sync::Arc};
use tracing::info;

/// Entry point for talking to a ledger network.
///
/// Safe to share between tasks. Every request shares node health through the same [`Network`].
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    network: Arc<Network>,
    mirror: Arc<MirrorNetwork>,
    dispatcher: Dispatcher,
    operator: RwLock<Option<Operator>>,
}

impl Client {
    /// Build a client whose channels come from `connector`.
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> ConfigResult<Self> {
        config.validate()?;

        let network = Arc::new(Network::from_map(&config.network, config.node, connector.clone()));
        let mirror = Arc::new(MirrorNetwork::new(
            &config.mirror_network,
            config.node,
            config.subscription.connect_timeout,
            connector,
        ));
        let dispatcher = Dispatcher::new(network.clone(), config.execution);
        info!(
            target: "client",
            nodes = config.network.len(),
            mirrors = config.mirror_network.len(),
            "client created"
        );

        Ok(Self { config, network, mirror, dispatcher, operator: RwLock::new(None) })
    }

    /// Build a client over tonic gRPC channels.
    pub fn for_grpc(config: ClientConfig) -> ConfigResult<Self> {
        Self::new(config, Arc::new(GrpcConnector))
    }

    /// Build a gRPC client from a yaml config file.
    pub fn from_config_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let config = ClientConfig::load_from_path(path)?;
        Ok(Self::for_grpc(config)?)
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Consensus nodes.
    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Mirror nodes.
    pub fn mirror_network(&self) -> &Arc<MirrorNetwork> {
        &self.mirror
    }

    /// The dispatcher shared by every request.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Replace the consensus nodes. Nodes that remain keep their health.
    pub fn set_network(&self, network: &BTreeMap<NodeAddress, AccountId>) {
        self.network.set_network(network);
    }

    /// Replace the mirror nodes.
    pub fn set_mirror_network(&self, addresses: &[NodeAddress]) {
        self.mirror.set_network(addresses);
    }

    /// Pay for and sign transactions with `account_id`.
    pub fn set_operator(&self, account_id: AccountId, signer: Arc<dyn Signer>) {
        info!(target: "client", %account_id, "operator set");
        *self.operator.write() = Some(Operator { account_id, signer });
    }

    /// The current operator.
    pub fn operator(&self) -> Option<Operator> {
        self.operator.read().clone()
    }

    /// Execute a request.
    pub async fn execute<E: Executable>(&self, request: &mut E) -> ExecuteResult<E::Response> {
        self.dispatcher.execute(request).await
    }

    /// A chunked transaction using the client chunk limits.
    pub fn chunked<B: ChunkBuilder>(
        &self,
        builder: B,
        payload: impl Into<Bytes>,
    ) -> ChunkedTransaction<B> {
        ChunkedTransaction::new(builder, payload, &self.config.chunking)
    }

    /// Submit every chunk of `transaction`, signed and paid for by the operator.
    pub async fn execute_chunked<B: ChunkBuilder>(
        &self,
        transaction: &mut ChunkedTransaction<B>,
    ) -> ExecuteResult<Vec<TransactionResponse>> {
        let operator = self.operator();
        transaction.execute_all(&self.dispatcher, operator.as_ref()).await
    }

    /// Start a topic subscription on the mirror network.
    pub fn subscribe<C: TopicMessageCodec>(
        &self,
        query: TopicMessageQuery,
        codec: Arc<C>,
    ) -> SubscriptionResult<SubscriptionHandle> {
        query.subscribe(self.mirror.clone(), &self.config.subscription, codec)
    }

    /// Close every channel.
    pub fn close(&self) {
        self.network.close();
        self.mirror.close();
        info!(target: "client", "client closed");
    }
}
