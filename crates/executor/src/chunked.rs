//! Splitting oversized payloads into sequential chunk transactions.
//!
//! Chunk `i` carries `payload[i * chunk_size..]` (at most `chunk_size` bytes) and the transaction
//! id of the first chunk shifted by `i` nanoseconds. Chunks are submitted one at a time so the
//! network observes them in valid-start order.

use crate::{
    Dispatcher, ExecuteError, ExecuteResult, Executable, Operator, ReceiptWaiter,
};
use bytes::Bytes;
use lc_config::{ChunkConfig, ExecutionOverrides};
use lc_network::GrpcMethod;
use lc_types::{
    ensure, AccountId, SignaturePair, Signer, Status, TransactionHash, TransactionId,
    TransactionResponse,
};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, info, instrument};

/// One chunk handed to a [`ChunkBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Zero-based position.
    pub index: usize,
    /// Number of chunks in the sequence.
    pub total: usize,
    /// Id of the first chunk, shared by every chunk in the sequence.
    pub initial_transaction_id: TransactionId,
    /// This chunk's id.
    pub transaction_id: TransactionId,
    /// This chunk's slice of the payload.
    pub body: &'a [u8],
}

/// Builds the wire request for one chunk.
///
/// The builder owns the message schema: it serializes the chunk body for a node, and wraps a
/// body plus its signatures into the signed request.
pub trait ChunkBuilder: Send + Sync {
    /// The gRPC method chunks are submitted to.
    fn method(&self) -> GrpcMethod;

    /// Serialize the unsigned body of `chunk` targeted at `node_account_id`.
    fn chunk_body(&self, chunk: &Chunk<'_>, node_account_id: AccountId) -> ExecuteResult<Vec<u8>>;

    /// Wrap a body and its signatures into the signed request bytes.
    fn signed_request(
        &self,
        body: Vec<u8>,
        signatures: Vec<SignaturePair>,
    ) -> ExecuteResult<Vec<u8>>;

    /// Read the precheck status from a node response.
    fn response_status(&self, response: &[u8]) -> ExecuteResult<Status>;
}

/// A payload submitted as one or more chunk transactions.
pub struct ChunkedTransaction<B> {
    builder: B,
    payload: Bytes,
    chunk_size: usize,
    max_chunks: usize,
    /// Id for the first chunk. Generated for the operator at execution when unset.
    transaction_id: Option<TransactionId>,
    /// One id per chunk, filled when frozen.
    transaction_ids: Vec<TransactionId>,
    node_account_ids: Vec<AccountId>,
    signers: Vec<Arc<dyn Signer>>,
    overrides: ExecutionOverrides,
    receipt_waiter: Option<Arc<dyn ReceiptWaiter>>,
    /// Chunk currently being submitted. Reset to zero when a sequence ends.
    cursor: usize,
}

impl<B: fmt::Debug> fmt::Debug for ChunkedTransaction<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedTransaction")
            .field("builder", &self.builder)
            .field("payload_len", &self.payload.len())
            .field("chunk_size", &self.chunk_size)
            .field("max_chunks", &self.max_chunks)
            .field("transaction_ids", &self.transaction_ids)
            .field("node_account_ids", &self.node_account_ids)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl<B: ChunkBuilder> ChunkedTransaction<B> {
    /// Create a chunked transaction using the client chunk limits.
    pub fn new(builder: B, payload: impl Into<Bytes>, limits: &ChunkConfig) -> Self {
        Self {
            builder,
            payload: payload.into(),
            chunk_size: limits.chunk_size,
            max_chunks: limits.max_chunks,
            transaction_id: None,
            transaction_ids: Vec::new(),
            node_account_ids: Vec::new(),
            signers: Vec::new(),
            overrides: ExecutionOverrides::default(),
            receipt_waiter: None,
            cursor: 0,
        }
    }

    /// Override the chunk size for this transaction.
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> ExecuteResult<&mut Self> {
        self.require_not_frozen()?;
        self.chunk_size = chunk_size;
        Ok(self)
    }

    /// Override the chunk limit for this transaction.
    pub fn set_max_chunks(&mut self, max_chunks: usize) -> ExecuteResult<&mut Self> {
        self.require_not_frozen()?;
        self.max_chunks = max_chunks;
        Ok(self)
    }

    /// Use an explicit id for the first chunk.
    pub fn set_transaction_id(&mut self, transaction_id: TransactionId) -> ExecuteResult<&mut Self> {
        self.require_not_frozen()?;
        self.transaction_id = Some(transaction_id);
        Ok(self)
    }

    /// Target explicit nodes.
    pub fn set_node_account_ids(&mut self, node_account_ids: Vec<AccountId>) -> ExecuteResult<&mut Self> {
        self.require_not_frozen()?;
        self.node_account_ids = node_account_ids;
        Ok(self)
    }

    /// Per-call retry settings applied to every chunk.
    pub fn set_overrides(&mut self, overrides: ExecutionOverrides) -> &mut Self {
        self.overrides = overrides;
        self
    }

    /// Wait for each chunk's receipt before submitting the next one.
    pub fn set_receipt_waiter(&mut self, waiter: Arc<dyn ReceiptWaiter>) -> &mut Self {
        self.receipt_waiter = Some(waiter);
        self
    }

    /// Add a signer. Every chunk request carries a signature from every signer.
    pub fn sign_with(&mut self, signer: Arc<dyn Signer>) -> &mut Self {
        let key = signer.public_key();
        if !self.signers.iter().any(|s| s.public_key() == key) {
            self.signers.push(signer);
        }
        self
    }

    /// The payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The request builder.
    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Chunks the payload needs. Fails if that exceeds the chunk limit.
    ///
    /// An empty payload still needs one chunk.
    pub fn required_chunks(&self) -> ExecuteResult<usize> {
        ensure!(self.chunk_size > 0, ExecuteError::IllegalState("chunk size must be positive".into()));
        let required = self.payload.len().div_ceil(self.chunk_size).max(1);
        ensure!(
            required <= self.max_chunks,
            ExecuteError::IllegalState(format!(
                "cannot execute chunked transaction with more than {} chunks, payload requires {required}",
                self.max_chunks
            ))
        );
        Ok(required)
    }

    /// Whether ids and nodes are fixed.
    pub fn is_frozen(&self) -> bool {
        !self.transaction_ids.is_empty()
    }

    fn require_not_frozen(&self) -> ExecuteResult<()> {
        ensure!(
            !self.is_frozen(),
            ExecuteError::IllegalState("transaction is immutable once frozen".into())
        );
        Ok(())
    }

    /// Fix the chunk ids and target nodes.
    ///
    /// Chunk `i` receives `first.plus_nanos(i)`.
    pub fn freeze(
        &mut self,
        first: TransactionId,
        node_account_ids: Vec<AccountId>,
    ) -> ExecuteResult<&mut Self> {
        self.require_not_frozen()?;
        ensure!(
            !node_account_ids.is_empty(),
            ExecuteError::IllegalState("cannot freeze without node account ids".into())
        );
        let required = self.required_chunks()?;
        self.transaction_id = Some(first);
        self.node_account_ids = node_account_ids;
        self.transaction_ids = (0..required as u64).map(|i| first.plus_nanos(i)).collect();
        Ok(self)
    }

    /// Freeze with defaults taken from the operator and the network.
    async fn freeze_with(
        &mut self,
        dispatcher: &Dispatcher,
        operator: Option<&Operator>,
    ) -> ExecuteResult<()> {
        let first = match (self.transaction_id, operator) {
            (Some(id), _) => id,
            (None, Some(operator)) => TransactionId::generate(operator.account_id),
            (None, None) => {
                return Err(ExecuteError::IllegalState(
                    "no transaction id set and no operator to generate one".into(),
                ))
            }
        };
        let nodes = if self.node_account_ids.is_empty() {
            dispatcher.network().node_account_ids_for_execute().await?
        } else {
            std::mem::take(&mut self.node_account_ids)
        };
        self.freeze(first, nodes)?;
        Ok(())
    }

    /// The id of the first chunk, once known.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_ids.first().copied().or(self.transaction_id)
    }

    /// Every chunk id, in order. Empty until frozen.
    pub fn transaction_ids(&self) -> &[TransactionId] {
        &self.transaction_ids
    }

    /// Target nodes.
    pub fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    /// The chunk currently being submitted.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn chunk(&self, index: usize) -> Chunk<'_> {
        let start = (index * self.chunk_size).min(self.payload.len());
        let end = (start + self.chunk_size).min(self.payload.len());
        Chunk {
            index,
            total: self.transaction_ids.len(),
            initial_transaction_id: self.transaction_ids[0],
            transaction_id: self.transaction_ids[index],
            body: &self.payload[start..end],
        }
    }

    /// Signed request bytes of chunk `index` for `node_account_id`.
    fn signed_chunk(&self, index: usize, node_account_id: AccountId) -> ExecuteResult<Vec<u8>> {
        let chunk = self.chunk(index);
        let body = self.builder.chunk_body(&chunk, node_account_id)?;
        let signatures = self.signers.iter().map(|signer| signer.sign_pair(&body)).collect();
        self.builder.signed_request(body, signatures)
    }

    fn require_frozen(&self) -> ExecuteResult<()> {
        ensure!(
            self.is_frozen(),
            ExecuteError::IllegalState("transaction must be frozen to compute hashes".into())
        );
        Ok(())
    }

    fn chunk_hashes(&self, index: usize) -> ExecuteResult<HashMap<AccountId, TransactionHash>> {
        self.node_account_ids
            .iter()
            .map(|node| Ok((*node, TransactionHash::of(&self.signed_chunk(index, *node)?))))
            .collect()
    }

    /// Per-node hash of the single chunk. Fails when there is more than one chunk.
    pub fn transaction_hash_per_node(&self) -> ExecuteResult<HashMap<AccountId, TransactionHash>> {
        self.require_frozen()?;
        ensure!(
            self.transaction_ids.len() == 1,
            ExecuteError::IllegalState(
                "a single transaction hash is not meaningful for a multi-chunk transaction, use all_transaction_hashes_per_node".into()
            )
        );
        self.chunk_hashes(0)
    }

    /// Hash of the single chunk as sent to the first node. Fails when there is more than one chunk.
    pub fn transaction_hash(&self) -> ExecuteResult<TransactionHash> {
        let hashes = self.transaction_hash_per_node()?;
        let first = self.node_account_ids[0];
        hashes
            .get(&first)
            .copied()
            .ok_or_else(|| ExecuteError::IllegalState(format!("no hash for node {first}")))
    }

    /// Per-node hashes for every chunk, in chunk order.
    pub fn all_transaction_hashes_per_node(
        &self,
    ) -> ExecuteResult<Vec<HashMap<AccountId, TransactionHash>>> {
        self.require_frozen()?;
        (0..self.transaction_ids.len()).map(|index| self.chunk_hashes(index)).collect()
    }

    /// Submit every chunk in order and return one response per chunk.
    ///
    /// The payload size is checked before anything is sent. A failure at any chunk aborts the
    /// sequence. The chunk cursor returns to zero either way.
    #[instrument(level = "debug", skip_all, fields(payload = self.payload.len()))]
    pub async fn execute_all(
        &mut self,
        dispatcher: &Dispatcher,
        operator: Option<&Operator>,
    ) -> ExecuteResult<Vec<TransactionResponse>> {
        self.required_chunks()?;
        if let Some(operator) = operator {
            self.sign_with(operator.signer.clone());
        }
        if !self.is_frozen() {
            self.freeze_with(dispatcher, operator).await?;
        }

        let result = self.submit_chunks(dispatcher).await;
        self.cursor = 0;
        result
    }

    /// Submit every chunk and return the first chunk's response.
    pub async fn execute(
        &mut self,
        dispatcher: &Dispatcher,
        operator: Option<&Operator>,
    ) -> ExecuteResult<TransactionResponse> {
        let mut responses = self.execute_all(dispatcher, operator).await?;
        ensure!(!responses.is_empty(), ExecuteError::IllegalState("no chunks were submitted".into()));
        Ok(responses.swap_remove(0))
    }

    async fn submit_chunks(&mut self, dispatcher: &Dispatcher) -> ExecuteResult<Vec<TransactionResponse>> {
        let total = self.transaction_ids.len();
        let mut responses = Vec::with_capacity(total);

        for index in 0..total {
            self.cursor = index;
            let transaction_id = self.transaction_ids[index];
            debug!(target: "chunked", index, total, %transaction_id, "submitting chunk");

            let mut request = ChunkRequest {
                transaction: &*self,
                index,
                node_account_ids: self.node_account_ids.clone(),
            };
            let response = dispatcher.execute(&mut request).await?;

            if let Some(waiter) = &self.receipt_waiter {
                waiter.wait_for_receipt(dispatcher, &response).await?;
            }
            responses.push(response);
        }

        info!(target: "chunked", chunks=total, first=?self.transaction_id(), "chunked transaction submitted");
        Ok(responses)
    }
}

/// One chunk of a frozen [`ChunkedTransaction`], as seen by the dispatcher.
struct ChunkRequest<'a, B> {
    transaction: &'a ChunkedTransaction<B>,
    index: usize,
    node_account_ids: Vec<AccountId>,
}

impl<B: ChunkBuilder> Executable for ChunkRequest<'_, B> {
    type Response = TransactionResponse;

    fn method(&self) -> GrpcMethod {
        self.transaction.builder.method()
    }

    fn node_account_ids(&self) -> &[AccountId] {
        &self.node_account_ids
    }

    fn set_node_account_ids(&mut self, node_account_ids: Vec<AccountId>) {
        self.node_account_ids = node_account_ids;
    }

    fn overrides(&self) -> ExecutionOverrides {
        self.transaction.overrides
    }

    fn transaction_id(&self) -> Option<TransactionId> {
        Some(self.transaction.transaction_ids[self.index])
    }

    fn make_request(&self, node_account_id: AccountId) -> ExecuteResult<Vec<u8>> {
        self.transaction.signed_chunk(self.index, node_account_id)
    }

    fn response_status(&self, response: &[u8]) -> ExecuteResult<Status> {
        self.transaction.builder.response_status(response)
    }

    fn map_response(
        &mut self,
        _response: Vec<u8>,
        node_account_id: AccountId,
        request: &[u8],
    ) -> ExecuteResult<TransactionResponse> {
        Ok(TransactionResponse {
            node_id: node_account_id,
            transaction_hash: TransactionHash::of(request),
            transaction_id: self.transaction.transaction_ids[self.index],
        })
    }
}
