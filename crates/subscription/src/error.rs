//! Errors reported by topic subscriptions.

use lc_config::ConfigError;
use lc_network::NetworkError;
use thiserror::Error;

/// The result for subscription operations.
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

/// Subscription failure.
///
/// Errors raised while building a query are returned from `subscribe`. Errors raised once the
/// stream is running go to the error handler.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Invalid reconnect settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// No mirror endpoint is configured.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// The query is incomplete.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// The stream failed and was not retried.
    #[error("subscription stream failed after {attempts} attempt(s) with {code:?}: {message}")]
    Stream {
        /// The gRPC code of the last failure.
        code: tonic::Code,
        /// The gRPC message of the last failure.
        message: String,
        /// Connection attempts made.
        attempts: u32,
    },
    /// The query could not be encoded.
    #[error("failed to encode subscription query: {0}")]
    Encode(String),
    /// A stream item could not be decoded.
    #[error("failed to decode topic message: {0}")]
    Decode(String),
    /// The subscription task panicked or was aborted.
    #[error("subscription task failed: {0}")]
    Task(String),
}
