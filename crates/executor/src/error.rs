//! Errors surfaced to callers of the dispatcher.

use lc_config::ConfigError;
use lc_network::NetworkError;
use lc_types::{Status, TransactionId};
use std::time::Duration;
use thiserror::Error;

/// The result for request execution.
pub type ExecuteResult<T> = Result<T, ExecuteError>;

/// Execution failure.
///
/// Transient transport and busy responses are retried internally and never appear here. Only
/// exhaustion, fatal statuses and misconfiguration reach the caller.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Invalid retry or chunking settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The request named nodes the network cannot resolve.
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// The operation cannot proceed in the current state.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// Every attempt failed transiently.
    #[error("max number of attempts made (max attempts allowed: {attempts}), last error: {last_error}")]
    MaxAttemptsExceeded {
        /// Attempts allowed for the call.
        attempts: u32,
        /// Description of the last transient failure.
        last_error: String,
    },
    /// The overall deadline passed.
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// The overall timeout for the call.
        timeout: Duration,
    },
    /// A node rejected the request with a status that is not retried.
    #[error("precheck failed with status {status} for transaction {}", display_id(.transaction_id))]
    PrecheckStatus {
        /// The rejecting status.
        status: Status,
        /// The transaction, for requests that carry one.
        transaction_id: Option<TransactionId>,
    },
    /// The transaction reached consensus but did not succeed.
    #[error("receipt for transaction {transaction_id} contained error status {status}")]
    ReceiptStatus {
        /// The receipt status.
        status: Status,
        /// The transaction.
        transaction_id: TransactionId,
    },
    /// A transport failure that is not retried.
    #[error("transport error {code:?}: {message}")]
    Transport {
        /// The gRPC code.
        code: tonic::Code,
        /// The gRPC message.
        message: String,
    },
    /// A request could not be built.
    #[error("failed to build request: {0}")]
    Encode(String),
    /// A response could not be read.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ExecuteError {
    /// Whether the failure is exhaustion of attempts or time rather than a fatal rejection.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::MaxAttemptsExceeded { .. } | Self::Timeout { .. })
    }
}

impl From<tonic::Status> for ExecuteError {
    fn from(status: tonic::Status) -> Self {
        Self::Transport { code: status.code(), message: status.message().to_string() }
    }
}

fn display_id(id: &Option<TransactionId>) -> String {
    id.map_or_else(|| "<none>".to_string(), |id| id.to_string())
}
