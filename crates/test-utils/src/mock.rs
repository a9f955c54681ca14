//! Scripted [`NodeChannel`] implementation.

use async_trait::async_trait;
use futures::{stream, StreamExt as _};
use lc_network::{Connector, GrpcMethod, NodeChannel, ResponseStream};
use lc_types::NodeAddress;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;
use tonic::Status;

/// Items a scripted server stream yields.
#[derive(Debug)]
pub struct MockStream {
    items: Vec<Result<Vec<u8>, Status>>,
    /// Keep the stream open after the last item instead of ending it.
    stay_open: bool,
}

impl MockStream {
    /// A stream that yields `items` and then ends cleanly.
    pub fn completing(items: Vec<Vec<u8>>) -> Self {
        Self { items: items.into_iter().map(Ok).collect(), stay_open: false }
    }

    /// A stream that yields `items` and then fails with `status`.
    pub fn failing(items: Vec<Vec<u8>>, status: Status) -> Self {
        let mut items: Vec<_> = items.into_iter().map(Ok).collect();
        items.push(Err(status));
        Self { items, stay_open: false }
    }

    /// A stream that yields `items` and then never produces anything else.
    pub fn open(items: Vec<Vec<u8>>) -> Self {
        Self { items: items.into_iter().map(Ok).collect(), stay_open: true }
    }

    fn into_stream(self) -> ResponseStream {
        let items = stream::iter(self.items);
        if self.stay_open {
            items.chain(stream::pending()).boxed()
        } else {
            items.boxed()
        }
    }
}

/// A channel whose behavior is scripted per call.
///
/// Unscripted connects succeed. Unscripted unary and streaming calls fail with `UNAVAILABLE`.
#[derive(Debug, Default)]
pub struct MockChannel {
    connects: Mutex<VecDeque<bool>>,
    unary: Mutex<VecDeque<Result<Vec<u8>, Status>>>,
    streams: Mutex<VecDeque<Result<MockStream, Status>>>,
    /// Every request received, in order.
    requests: Mutex<Vec<(GrpcMethod, Vec<u8>)>>,
    /// Deadlines passed to unary calls.
    deadlines: Mutex<Vec<Instant>>,
    connect_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockChannel {
    /// Script the result of the next connect.
    pub fn push_connect(&self, connected: bool) -> &Self {
        self.connects.lock().push_back(connected);
        self
    }

    /// Script the next unary response.
    pub fn push_response(&self, response: Vec<u8>) -> &Self {
        self.unary.lock().push_back(Ok(response));
        self
    }

    /// Script the next unary transport failure.
    pub fn push_error(&self, status: Status) -> &Self {
        self.unary.lock().push_back(Err(status));
        self
    }

    /// Script the next server stream.
    pub fn push_stream(&self, stream: MockStream) -> &Self {
        self.streams.lock().push_back(Ok(stream));
        self
    }

    /// Script a failure to open the next server stream.
    pub fn push_stream_error(&self, status: Status) -> &Self {
        self.streams.lock().push_back(Err(status));
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<(GrpcMethod, Vec<u8>)> {
        self.requests.lock().clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Deadlines passed to unary calls.
    pub fn deadlines(&self) -> Vec<Instant> {
        self.deadlines.lock().clone()
    }

    /// Number of connect calls.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of streams opened or attempted.
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeChannel for MockChannel {
    async fn connect(&self, _timeout: Duration) -> bool {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connects.lock().pop_front().unwrap_or(true)
    }

    async fn unary(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, Status> {
        self.requests.lock().push((method, request));
        self.deadlines.lock().push(deadline);
        self.unary
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(Status::unavailable("no scripted response")))
    }

    async fn server_streaming(
        &self,
        method: GrpcMethod,
        request: Vec<u8>,
    ) -> Result<ResponseStream, Status> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((method, request));
        let scripted = self.streams.lock().pop_front();
        match scripted {
            Some(Ok(stream)) => Ok(stream.into_stream()),
            Some(Err(status)) => Err(status),
            None => Err(Status::unavailable("no scripted stream")),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out one [`MockChannel`] per address.
#[derive(Debug, Default)]
pub struct MockConnector {
    channels: Mutex<HashMap<NodeAddress, Arc<MockChannel>>>,
}

impl MockConnector {
    /// Create a connector behind an `Arc`, ready to hand to a registry.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The channel for `address`, created on first use.
    pub fn mock(&self, address: &NodeAddress) -> Arc<MockChannel> {
        self.channels.lock().entry(address.clone()).or_default().clone()
    }
}

impl Connector for MockConnector {
    fn channel(&self, address: &NodeAddress) -> Arc<dyn NodeChannel> {
        self.mock(address)
    }
}
