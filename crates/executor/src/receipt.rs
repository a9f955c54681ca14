//! Waiting for a transaction to reach consensus.

use crate::{classify, Dispatcher, ExecuteError, ExecuteResult, Executable, ExecutionStatus};
use async_trait::async_trait;
use lc_config::ExecutionOverrides;
use lc_network::GrpcMethod;
use lc_types::{AccountId, Status, TransactionId, TransactionReceipt, TransactionResponse};
use std::sync::Arc;
use tracing::debug;

/// Schema hooks for receipt queries.
pub trait ReceiptCodec: Send + Sync {
    /// The gRPC method receipt queries are sent to.
    fn method(&self) -> GrpcMethod;

    /// Encode a receipt query for `transaction_id`, paid to `node_account_id`.
    fn encode_query(
        &self,
        transaction_id: TransactionId,
        node_account_id: AccountId,
    ) -> ExecuteResult<Vec<u8>>;

    /// Read the precheck status from the response header.
    fn header_status(&self, response: &[u8]) -> ExecuteResult<Status>;

    /// Decode the receipt carried by the response.
    fn decode_receipt(&self, response: &[u8]) -> ExecuteResult<TransactionReceipt>;
}

/// Receipt statuses meaning consensus has not been reached yet.
fn is_pending(status: Status) -> bool {
    matches!(status, Status::Unknown | Status::ReceiptNotFound | Status::RecordNotFound)
}

/// A receipt query for one transaction.
///
/// Pending receipts are retried with the call backoff until the receipt is final.
#[derive(Debug)]
pub struct ReceiptQuery<C> {
    codec: Arc<C>,
    transaction_id: TransactionId,
    node_account_ids: Vec<AccountId>,
    overrides: ExecutionOverrides,
}

impl<C: ReceiptCodec> ReceiptQuery<C> {
    /// Query the receipt of `transaction_id`.
    pub fn new(codec: Arc<C>, transaction_id: TransactionId) -> Self {
        Self {
            codec,
            transaction_id,
            node_account_ids: Vec::new(),
            overrides: ExecutionOverrides::default(),
        }
    }

    /// Ask specific nodes.
    pub fn with_node_account_ids(mut self, node_account_ids: Vec<AccountId>) -> Self {
        self.node_account_ids = node_account_ids;
        self
    }

    /// Per-call retry settings.
    pub fn with_overrides(mut self, overrides: ExecutionOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

impl<C: ReceiptCodec> Executable for ReceiptQuery<C> {
    type Response = TransactionReceipt;

    fn method(&self) -> GrpcMethod {
        self.codec.method()
    }

    fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    fn set_node_account_ids(&mut self, node_account_ids: Vec<AccountId>) {
        self.node_account_ids = node_account_ids;
    }

    fn overrides(&self) -> ExecutionOverrides {
        self.overrides
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        Some(self.transaction_id)
    }

    fn make_request(&self, node_account_id: AccountId) -> ExecuteResult<Vec<u8>> {
        self.codec.encode_query(self.transaction_id, node_account_id)
    }

    fn response_status(&self, response: &[u8]) -> ExecuteResult<Status> {
        self.codec.header_status(response)
    }

    fn determine_status(
        &mut self,
        status: Status,
        response: &[u8],
    ) -> ExecuteResult<ExecutionStatus> {
        if is_pending(status) {
            return Ok(ExecutionStatus::Retry);
        }
        match classify(status) {
            ExecutionStatus::Success => {
                let receipt = self.codec.decode_receipt(response)?;
                if is_pending(receipt.status) {
                    debug!(target: "executor", transaction_id=%self.transaction_id, status=%receipt.status, "receipt not final");
                    Ok(ExecutionStatus::Retry)
                } else {
                    Ok(ExecutionStatus::Success)
                }
            }
            other => Ok(other),
        }
    }

    fn map_response(
        &mut self,
        response: Vec<u8>,
        _node_account_id: AccountId,
        _request: &[u8],
    ) -> ExecuteResult<TransactionReceipt> {
        self.codec.decode_receipt(&response)
    }
}

/// Waits for a submitted transaction to reach consensus.
#[async_trait]
pub trait ReceiptWaiter: Send + Sync {
    /// Wait for the receipt of `response` and fail unless it succeeded.
    async fn wait_for_receipt(
        &self,
        dispatcher: &Dispatcher,
        response: &TransactionResponse,
    ) -> ExecuteResult<TransactionReceipt>;
}

/// [`ReceiptWaiter`] that queries the node which accepted the transaction.
#[derive(Debug)]
pub struct ReceiptFetcher<C> {
    codec: Arc<C>,
    overrides: ExecutionOverrides,
}

impl<C> ReceiptFetcher<C> {
    /// Create a fetcher using `codec`.
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec, overrides: ExecutionOverrides::default() }
    }

    /// Retry settings for the receipt queries.
    pub fn with_overrides(mut self, overrides: ExecutionOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

#[async_trait]
impl<C: ReceiptCodec + 'static> ReceiptWaiter for ReceiptFetcher<C> {
    async fn wait_for_receipt(
        &self,
        dispatcher: &Dispatcher,
        response: &TransactionResponse,
    ) -> ExecuteResult<TransactionReceipt> {
        let mut query = ReceiptQuery::new(self.codec.clone(), response.transaction_id)
            .with_node_account_ids(vec![response.node_id])
            .with_overrides(self.overrides);
        let receipt = dispatcher.execute(&mut query).await?;
        if receipt.status != Status::Success {
            return Err(ExecuteError::ReceiptStatus {
                status: receipt.status,
                transaction_id: response.transaction_id,
            });
        }
        Ok(receipt)
    }
}
