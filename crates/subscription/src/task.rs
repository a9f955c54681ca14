//! The reconnect loop driving one subscription.

use crate::{
    CompletionHandler, ErrorHandler, MessageHandler, PendingMessageBuffer, RetryPredicate,
    SubscriptionCursor, SubscriptionError, SubscriptionResult, SubscriptionState,
    TopicMessageCodec,
};
use backoff::{backoff::Backoff as _, ExponentialBackoff, ExponentialBackoffBuilder};
use futures::StreamExt as _;
use lc_config::SubscriptionConfig;
use lc_network::{Endpoint, MirrorNetwork, NetworkError, ResponseStream};
use std::sync::Arc;
use tokio::sync::watch;
use tonic::Status;
use tracing::{debug, info, warn};

/// Caller callbacks.
pub(crate) struct Handlers {
    pub(crate) on_message: MessageHandler,
    pub(crate) on_error: ErrorHandler,
    pub(crate) on_complete: CompletionHandler,
    pub(crate) retry: RetryPredicate,
}

/// How the subscription ended.
enum Outcome {
    Completed,
    Failed(SubscriptionError),
    Cancelled,
}

/// Why a stream stopped delivering items.
enum StreamEnd {
    /// The server closed the stream cleanly.
    Finished,
    /// The transport failed. May be retried.
    Failed(Status),
    /// An item could not be processed. Never retried.
    Fatal(SubscriptionError),
}

/// Reconnect delays: `min_backoff`, doubling up to `max_backoff`, never giving up by time.
fn reconnect_backoff(policy: &SubscriptionConfig) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.min_backoff)
        .with_randomization_factor(0.0)
        .with_multiplier(2.0)
        .with_max_interval(policy.max_backoff)
        .with_max_elapsed_time(None)
        .build()
}

/// Resolves once `unsubscribe` is called. Never resolves if the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// State owned by a subscription task.
pub(crate) struct Subscription<C> {
    mirror: Arc<MirrorNetwork>,
    codec: Arc<C>,
    cursor: SubscriptionCursor,
    max_attempts: u32,
    backoff: ExponentialBackoff,
    handlers: Handlers,
    pending: PendingMessageBuffer,
    state: watch::Sender<SubscriptionState>,
}

impl<C: TopicMessageCodec> Subscription<C> {
    pub(crate) fn new(
        mirror: Arc<MirrorNetwork>,
        codec: Arc<C>,
        cursor: SubscriptionCursor,
        policy: &SubscriptionConfig,
        handlers: Handlers,
        state: watch::Sender<SubscriptionState>,
    ) -> Self {
        Self {
            mirror,
            codec,
            cursor,
            max_attempts: policy.max_attempts,
            backoff: reconnect_backoff(policy),
            handlers,
            pending: PendingMessageBuffer::new(),
            state,
        }
    }

    fn set_state(&self, state: SubscriptionState) {
        self.state.send_replace(state);
    }

    /// Run until the stream completes, fails for good or the handle unsubscribes.
    pub(crate) async fn run(mut self, mut cancel: watch::Receiver<bool>) -> SubscriptionState {
        let topic_id = self.cursor.topic_id;
        let outcome = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Outcome::Cancelled,
            outcome = self.drive() => outcome,
        };

        let state = match outcome {
            Outcome::Completed => {
                info!(target: "subscription", %topic_id, "subscription completed");
                (self.handlers.on_complete)();
                SubscriptionState::Completed
            }
            Outcome::Failed(err) => {
                warn!(target: "subscription", %topic_id, %err, "subscription failed");
                (self.handlers.on_error)(&err);
                SubscriptionState::Failed
            }
            Outcome::Cancelled => {
                info!(target: "subscription", %topic_id, "unsubscribed");
                SubscriptionState::Cancelled
            }
        };
        self.set_state(state);
        state
    }

    async fn drive(&mut self) -> Outcome {
        let mut attempt = 0u32;
        loop {
            self.set_state(SubscriptionState::Connecting);
            let failure = match self.stream_once().await {
                Ok(StreamEnd::Finished) => return Outcome::Completed,
                Ok(StreamEnd::Failed(status)) => status,
                Ok(StreamEnd::Fatal(err)) | Err(err) => return Outcome::Failed(err),
            };

            attempt += 1;
            if self.cursor.is_exhausted() {
                debug!(target: "subscription", code=?failure.code(), "stream failed after delivering the requested limit");
                return Outcome::Completed;
            }
            if attempt >= self.max_attempts || !(self.handlers.retry)(&failure) {
                return Outcome::Failed(SubscriptionError::Stream {
                    code: failure.code(),
                    message: failure.message().to_string(),
                    attempts: attempt,
                });
            }

            let delay = self.backoff.next_backoff().unwrap_or(self.backoff.max_interval);
            warn!(
                target: "subscription",
                topic_id=%self.cursor.topic_id,
                attempt,
                code=?failure.code(),
                ?delay,
                "subscription stream failed, reconnecting"
            );
            self.set_state(SubscriptionState::Reconnecting);
            tokio::time::sleep(delay).await;
        }
    }

    /// Connect, open the stream at the cursor and consume it.
    async fn stream_once(&mut self) -> SubscriptionResult<StreamEnd> {
        let endpoint = self.connect().await?;
        let request = self.codec.encode_query(&self.cursor)?;
        debug!(target: "subscription", address=%endpoint.address(), cursor=?self.cursor, "opening stream");

        match endpoint.open_stream(self.codec.method(), request).await {
            Ok(stream) => {
                self.set_state(SubscriptionState::Streaming);
                Ok(self.consume(stream).await)
            }
            Err(status) => Ok(StreamEnd::Failed(status)),
        }
    }

    /// A mirror endpoint that accepted a connection. Waits out the backoff of every endpoint
    /// when a full rotation fails.
    async fn connect(&self) -> SubscriptionResult<Arc<Endpoint>> {
        loop {
            match self.mirror.connected_endpoint().await {
                Ok(endpoint) => return Ok(endpoint),
                Err(NetworkError::MirrorUnavailable { retry_after }) => {
                    debug!(target: "subscription", ?retry_after, "no mirror endpoint reachable");
                    tokio::time::sleep(retry_after).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn consume(&mut self, mut stream: ResponseStream) -> StreamEnd {
        while let Some(item) = stream.next().await {
            let bytes = match item {
                Ok(bytes) => bytes,
                Err(status) => return StreamEnd::Failed(status),
            };
            let response = match self.codec.decode_response(&bytes) {
                Ok(response) => response,
                Err(err) => return StreamEnd::Fatal(err),
            };

            self.cursor.advance(response.consensus_timestamp);
            if let Some(message) = self.pending.push(response) {
                (self.handlers.on_message)(message);
            }
        }
        StreamEnd::Finished
    }
}
