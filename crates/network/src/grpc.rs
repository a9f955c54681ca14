//! tonic transport for opaque request bytes.
//!
//! Message schemas belong to the request builders, so the channel moves already-encoded protobuf
//! bytes with a pass-through codec.

use crate::{Connector, GrpcMethod, NodeChannel, ResponseStream};
use async_trait::async_trait;
use bytes::{Buf as _, BufMut as _};
use futures::StreamExt as _;
use lc_types::NodeAddress;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tonic::{
    client::Grpc,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    codegen::http::uri::PathAndQuery,
    transport::{Channel, ClientTlsConfig, Endpoint},
    Request, Status,
};
use tracing::{debug, warn};

/// Codec that writes and reads message bodies unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    type Encode = Vec<u8>;
    type Decode = Vec<u8>;
    type Encoder = RawCodec;
    type Decoder = RawCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawCodec
    }
}

impl Encoder for RawCodec {
    type Item = Vec<u8>;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put_slice(&item);
        Ok(())
    }
}

impl Decoder for RawCodec {
    type Item = Vec<u8>;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut item = vec![0; src.remaining()];
        src.copy_to_slice(&mut item);
        Ok(Some(item))
    }
}

/// A lazily connected tonic channel to one endpoint.
#[derive(Debug)]
pub struct GrpcChannel {
    address: NodeAddress,
    channel: Mutex<Option<Channel>>,
}

impl GrpcChannel {
    /// Create an unconnected channel.
    pub fn new(address: NodeAddress) -> Self {
        Self { address, channel: Mutex::new(None) }
    }

    fn endpoint(&self, timeout: Duration) -> Result<Endpoint, tonic::transport::Error> {
        let endpoint = Endpoint::from_shared(self.address.to_uri())?
            .connect_timeout(timeout)
            .tcp_keepalive(Some(Duration::from_secs(100)));
        if self.address.is_transport_security() {
            endpoint.tls_config(
                ClientTlsConfig::new().domain_name(self.address.host()).with_webpki_roots(),
            )
        } else {
            Ok(endpoint)
        }
    }

    fn connected(&self) -> Result<Channel, Status> {
        self.channel
            .lock()
            .clone()
            .ok_or_else(|| Status::unavailable(format!("channel to {} is not connected", self.address)))
    }
}

#[async_trait]
impl NodeChannel for GrpcChannel {
    async fn connect(&self, timeout: Duration) -> bool {
        if self.channel.lock().is_some() {
            return true;
        }

        let endpoint = match self.endpoint(timeout) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(target: "network", address=%self.address, ?e, "invalid endpoint");
                return false;
            }
        };

        match tokio::time::timeout(timeout, endpoint.connect()).await {
            Ok(Ok(channel)) => {
                debug!(target: "network", address=%self.address, "channel connected");
                *self.channel.lock() = Some(channel);
                true
            }
            Ok(Err(e)) => {
                debug!(target: "network", address=%self.address, ?e, "channel failed to connect");
                false
            }
            Err(_) => {
                debug!(target: "network", address=%self.address, ?timeout, "channel connect timed out");
                false
            }
        }
    }

    async fn unary(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, Status> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Status::deadline_exceeded("attempt deadline already passed"));
        }

        let mut grpc = Grpc::new(self.connected()?);
        grpc.ready().await.map_err(|e| Status::unavailable(e.to_string()))?;

        let mut request = Request::new(request);
        request.set_timeout(remaining);
        let response =
            grpc.unary(request, PathAndQuery::from_static(method.path()), RawCodec).await?;
        Ok(response.into_inner())
    }

    async fn server_streaming(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
    ) -> Result<ResponseStream, Status> {
        let mut grpc = Grpc::new(self.connected()?);
        grpc.ready().await.map_err(|e| Status::unavailable(e.to_string()))?;

        let response = grpc
            .server_streaming(Request::new(request), PathAndQuery::from_static(method.path()), RawCodec)
            .await?;
        Ok(response.into_inner().boxed())
    }

    fn close(&self) {
        if self.channel.lock().take().is_some() {
            debug!(target: "network", address=%self.address, "channel closed");
        }
    }
}

/// Creates [`GrpcChannel`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcConnector;

impl Connector for GrpcConnector {
    fn channel(&self, address: &NodeAddress) -> Arc<dyn NodeChannel> {
        Arc::new(GrpcChannel::new(address.clone()))
    }
}
