//! The interface a request implements to be driven by the dispatcher.

use crate::{classify, ExecuteResult, ExecutionStatus};
use lc_config::ExecutionOverrides;
use lc_network::GrpcMethod;
use lc_types::{AccountId, Status, TransactionId};

/// A request the [`Dispatcher`](crate::Dispatcher) can submit.
///
/// Implementations own the message schema. The dispatcher sees requests and responses as opaque
/// bytes and only reads the precheck status through [`Executable::response_status`].
pub trait Executable: Send {
    /// What the caller receives on success.
    type Response: Send;

    /// The gRPC method the request is sent to.
    fn method(&self) -> GrpcMethod;

    /// Candidate nodes. Empty means the dispatcher chooses.
    fn node_account_ids(&self) -> &[AccountId];

    /// Store the nodes the dispatcher chose. Called once, before the first attempt.
    fn set_node_account_ids(&mut self, node_account_ids: Vec<AccountId>);

    /// Per-call retry settings.
    fn overrides(&self) -> ExecutionOverrides {
        ExecutionOverrides::default()
    }

    /// The transaction id carried by the request, if any.
    fn transaction_id(&self) -> Option<TransactionId> {
        None
    }

    /// Build the signed request bytes destined for `node_account_id`.
    fn make_request(&self, node_account_id: AccountId) -> ExecuteResult<Vec<u8>>;

    /// Read the precheck status from a response.
    fn response_status(&self, response: &[u8]) -> ExecuteResult<Status>;

    /// Decide what to do with a response. Requests with their own retry rules override this.
    fn determine_status(
        &mut self,
        status: Status,
        _response: &[u8],
    ) -> ExecuteResult<ExecutionStatus> {
        Ok(classify(status))
    }

    /// Map a successful response. `request` is the exact bytes sent to the node.
    fn map_response(
        &mut self,
        response: Vec<u8>,
        node_account_id: AccountId,
        request: &[u8],
    ) -> ExecuteResult<Self::Response>;
}
