//! Ledger client.
//!
//! [`Client`] owns the consensus and mirror networks built from a [`ClientConfig`], the
//! operator paying for transactions, and the entry points for executing requests, chunked
//! transactions and topic subscriptions.

#![warn(unused_crate_dependencies)]

mod client;
pub use client::Client;

pub use lc_config::{ClientConfig, ExecutionOverrides};
pub use lc_executor::{
    ChunkBuilder, ChunkedTransaction, ExecuteError, ExecuteResult, Executable, Operator,
    ReceiptFetcher, ReceiptQuery,
};
pub use lc_network::{Connector, GrpcConnector};
pub use lc_subscription::{
    SubscriptionError, SubscriptionHandle, SubscriptionResult, SubscriptionState,
    TopicMessageCodec, TopicMessageQuery,
};
