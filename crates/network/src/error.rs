//! Error types for node registries.

use lc_types::AccountId;
use std::time::Duration;
use thiserror::Error;

/// The result for registry operations.
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Registry error type.
///
/// These signal misconfiguration rather than transient faults and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// A request named a node the registry does not know.
    #[error("node account id {0} is not in the network")]
    UnknownNode(AccountId),
    /// A request was made without any target node.
    #[error("no node account ids were provided")]
    NoNodeAccountIds,
    /// The registry holds no nodes.
    #[error("network has no nodes")]
    EmptyNetwork,
    /// Every mirror endpoint failed to connect during one rotation.
    #[error("no mirror node could be reached, earliest retry in {retry_after:?}")]
    MirrorUnavailable {
        /// Smallest remaining backoff across the mirror endpoints.
        retry_after: Duration,
    },
}
