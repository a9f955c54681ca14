//! Transport seam between the registries and the wire.

use async_trait::async_trait;
use futures::stream::BoxStream;
use lc_types::NodeAddress;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tonic::{Code, Status};

/// Stream of raw response messages from a server-streaming call.
pub type ResponseStream = BoxStream<'static, Result<Vec<u8>, Status>>;

/// Fully qualified gRPC method path, e.g. `/proto.CryptoService/cryptoTransfer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GrpcMethod(&'static str);

impl GrpcMethod {
    /// Create a method from its path.
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    /// The method path.
    pub const fn path(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for GrpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A connection to one endpoint carrying opaque request bytes.
#[async_trait]
pub trait NodeChannel: Send + Sync + fmt::Debug {
    /// Make sure the channel is connected, waiting at most `timeout`.
    ///
    /// Returns `false` if the endpoint could not be reached.
    async fn connect(&self, timeout: Duration) -> bool;

    /// Send one request and wait for its response until `deadline`.
    async fn unary(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, Status>;

    /// Open a server-streaming call.
    async fn server_streaming(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
    ) -> Result<ResponseStream, Status>;

    /// Drop the underlying connection.
    fn close(&self);
}

/// Creates channels for endpoints as they are admitted.
pub trait Connector: Send + Sync + fmt::Debug {
    /// A channel for `address`. Connection is deferred until [`NodeChannel::connect`].
    fn channel(&self, address: &NodeAddress) -> Arc<dyn NodeChannel>;
}

/// Transport failures absorbed into node backoff and retried.
pub fn is_transient(status: &Status) -> bool {
    matches!(status.code(), Code::Unavailable | Code::ResourceExhausted | Code::Internal)
}
