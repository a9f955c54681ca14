//! Mirror node topic subscriptions.
//!
//! A [`TopicMessageQuery`] opens a server stream on a mirror endpoint, reassembles multi-part
//! messages and reconnects with exponential backoff, resuming after the last delivered item.
//! The subscription runs on its own task and is controlled through a [`SubscriptionHandle`].

mod codec;
pub mod error;
mod handle;
mod pending;
mod query;
mod task;

pub use codec::{SubscriptionCursor, TopicMessageCodec};
pub use error::{SubscriptionError, SubscriptionResult};
pub use handle::{SubscriptionHandle, SubscriptionState};
pub use pending::PendingMessageBuffer;
pub use query::{
    default_retry_predicate, CompletionHandler, ErrorHandler, MessageHandler, RetryPredicate,
    TopicMessageQuery,
};
