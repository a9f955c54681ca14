//! Building and starting topic subscriptions.

use crate::{
    task::{Handlers, Subscription},
    SubscriptionCursor, SubscriptionError, SubscriptionHandle, SubscriptionResult,
    SubscriptionState, TopicMessageCodec,
};
use lc_config::SubscriptionConfig;
use lc_network::{MirrorNetwork, NetworkError};
use lc_types::{ensure, Timestamp, TopicId, TopicMessage};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::watch;
use tonic::{Code, Status};
use tracing::{error, info};

/// Receives every complete message, in stream order.
pub type MessageHandler = Arc<dyn Fn(TopicMessage) + Send + Sync>;

/// Receives the error that ends a failed subscription.
pub type ErrorHandler = Arc<dyn Fn(&SubscriptionError) + Send + Sync>;

/// Runs once when the server ends the stream cleanly.
pub type CompletionHandler = Arc<dyn Fn() + Send + Sync>;

/// Decides whether a stream failure is worth reconnecting for.
pub type RetryPredicate = Arc<dyn Fn(&Status) -> bool + Send + Sync>;

/// Reconnect on `NOT_FOUND`, `RESOURCE_EXHAUSTED`, `UNAVAILABLE` and `INTERNAL`.
///
/// A topic created moments ago may not be visible on the mirror node yet, hence `NOT_FOUND`.
pub fn default_retry_predicate(status: &Status) -> bool {
    matches!(
        status.code(),
        Code::NotFound | Code::ResourceExhausted | Code::Unavailable | Code::Internal
    )
}

/// A subscription to the messages of one topic.
#[derive(Clone)]
pub struct TopicMessageQuery {
    topic_id: Option<TopicId>,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    limit: Option<u64>,
    max_attempts: Option<u32>,
    max_backoff: Option<Duration>,
    on_message: Option<MessageHandler>,
    on_error: ErrorHandler,
    on_complete: CompletionHandler,
    retry: RetryPredicate,
}

impl Default for TopicMessageQuery {
    fn default() -> Self {
        Self {
            topic_id: None,
            start_time: None,
            end_time: None,
            limit: None,
            max_attempts: None,
            max_backoff: None,
            on_message: None,
            on_error: Arc::new(|err: &SubscriptionError| {
                error!(target: "subscription", %err, "subscription failed");
            }),
            on_complete: Arc::new(|| {
                info!(target: "subscription", "subscription complete");
            }),
            retry: Arc::new(default_retry_predicate),
        }
    }
}

impl fmt::Debug for TopicMessageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicMessageQuery")
            .field("topic_id", &self.topic_id)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("limit", &self.limit)
            .field("max_attempts", &self.max_attempts)
            .field("max_backoff", &self.max_backoff)
            .finish_non_exhaustive()
    }
}

impl TopicMessageQuery {
    /// An empty query. A topic and a message handler are required before subscribing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The topic to follow.
    pub fn topic_id(mut self, topic_id: TopicId) -> Self {
        self.topic_id = Some(topic_id);
        self
    }

    /// Deliver messages reaching consensus at or after `start_time`.
    pub fn start_time(mut self, start_time: Timestamp) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Stop after messages reaching consensus at `end_time`.
    pub fn end_time(mut self, end_time: Timestamp) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Deliver at most `limit` stream items. Zero means unbounded.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    /// Total connection attempts before failing.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Upper bound for the reconnect delay.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    /// Handle complete messages.
    pub fn on_message(mut self, handler: impl Fn(TopicMessage) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(handler));
        self
    }

    /// Handle the error ending the subscription. Logs by default.
    pub fn on_error(
        mut self,
        handler: impl Fn(&SubscriptionError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Arc::new(handler);
        self
    }

    /// Handle clean completion. Logs by default.
    pub fn on_complete(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Arc::new(handler);
        self
    }

    /// Replace [`default_retry_predicate`].
    pub fn retry_handler(mut self, predicate: impl Fn(&Status) -> bool + Send + Sync + 'static) -> Self {
        self.retry = Arc::new(predicate);
        self
    }

    /// The reconnect policy after applying this query's overrides to `config`.
    pub fn resolve(&self, config: &SubscriptionConfig) -> SubscriptionResult<SubscriptionConfig> {
        let resolved = SubscriptionConfig {
            max_attempts: self.max_attempts.unwrap_or(config.max_attempts),
            max_backoff: self.max_backoff.unwrap_or(config.max_backoff),
            ..*config
        };
        resolved.validate()?;
        Ok(resolved)
    }

    /// Start the subscription on a new task.
    ///
    /// Must be called within a tokio runtime. Returns once the task is spawned; connection
    /// failures are reported to the error handler.
    pub fn subscribe<C: TopicMessageCodec>(
        self,
        mirror: Arc<MirrorNetwork>,
        config: &SubscriptionConfig,
        codec: Arc<C>,
    ) -> SubscriptionResult<SubscriptionHandle> {
        let topic_id = self
            .topic_id
            .ok_or_else(|| SubscriptionError::IllegalState("topic id is required".into()))?;
        let on_message = self
            .on_message
            .clone()
            .ok_or_else(|| SubscriptionError::IllegalState("message handler is required".into()))?;
        ensure!(!mirror.is_empty(), SubscriptionError::Network(NetworkError::EmptyNetwork));
        let policy = self.resolve(config)?;

        let cursor = SubscriptionCursor {
            topic_id,
            start_time: self.start_time,
            end_time: self.end_time,
            limit: self.limit,
        };
        let handlers = Handlers {
            on_message,
            on_error: self.on_error,
            on_complete: self.on_complete,
            retry: self.retry,
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Connecting);
        let subscription = Subscription::new(mirror, codec, cursor, &policy, handlers, state_tx);
        info!(target: "subscription", %topic_id, max_attempts=policy.max_attempts, "subscribing to topic");
        let task = tokio::spawn(subscription.run(cancel_rx));

        Ok(SubscriptionHandle::new(cancel_tx, state_rx, task))
    }
}
