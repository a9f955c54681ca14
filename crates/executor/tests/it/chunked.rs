//! Splitting, sequencing and receipt waiting for chunked transactions.

use crate::common::{
    dispatcher, receipt_response, status_response, SentChunk, TestChunkBuilder,
    TestReceiptCodec, TestSigner, CHUNK, RECEIPT,
};
use assert_matches::assert_matches;
use lc_config::ChunkConfig;
use lc_executor::{ChunkedTransaction, ExecuteError, Operator, ReceiptFetcher};
use lc_test_utils::{test_address, test_node_account, test_transaction_id, MockChannel};
use lc_types::{AccountId, Status, TransactionHash};
use proptest::prelude::*;
use std::sync::Arc;

fn limits(chunk_size: usize, max_chunks: usize) -> ChunkConfig {
    ChunkConfig { chunk_size, max_chunks }
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn respond_ok(node: &MockChannel, times: usize) {
    for _ in 0..times {
        node.push_response(status_response(Status::Ok));
    }
}

fn sent_chunks(node: &MockChannel) -> Vec<SentChunk> {
    node.requests()
        .into_iter()
        .filter(|(method, _)| *method == CHUNK)
        .map(|(_, body)| SentChunk::parse(&body))
        .collect()
}

fn concat_bodies(chunks: &[SentChunk]) -> Vec<u8> {
    chunks.iter().flat_map(|chunk| chunk.body.iter().copied()).collect()
}

fn transaction(payload: Vec<u8>, limits: ChunkConfig) -> ChunkedTransaction<TestChunkBuilder> {
    let mut transaction = ChunkedTransaction::new(TestChunkBuilder::default(), payload, &limits);
    transaction
        .set_transaction_id(test_transaction_id())
        .and_then(|tx| tx.set_node_account_ids(vec![test_node_account(0)]))
        .expect("not frozen");
    transaction
}

#[tokio::test(start_paused = true)]
async fn test_chunks_submitted_in_order_with_cascading_ids() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    respond_ok(&node, 3);

    let data = payload(2500);
    let mut transaction = transaction(data.clone(), limits(1024, 20));
    let responses = transaction.execute_all(&dispatcher, None).await?;

    let first = test_transaction_id();
    let expected_ids: Vec<_> = (0..3).map(|i| first.plus_nanos(i)).collect();
    assert_eq!(transaction.transaction_ids(), expected_ids);
    assert_eq!(
        responses.iter().map(|r| r.transaction_id).collect::<Vec<_>>(),
        expected_ids
    );

    let chunks = sent_chunks(&node);
    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i as u32);
        assert_eq!(chunk.total, 3);
        assert_eq!(chunk.valid_start, expected_ids[i].valid_start);
        assert_eq!(chunk.node, test_node_account(0).num);
    }
    assert_eq!(chunks.iter().map(|c| c.body.len()).collect::<Vec<_>>(), vec![1024, 1024, 452]);
    assert_eq!(concat_bodies(&chunks), data);
    assert_eq!(transaction.cursor(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_execute_returns_first_chunk_response() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    respond_ok(&connector.mock(&test_address(0)), 2);

    let mut transaction = transaction(payload(20), limits(10, 20));
    let response = transaction.execute(&dispatcher, None).await?;
    assert_eq!(response.transaction_id, test_transaction_id());
    assert_eq!(response.node_id, test_node_account(0));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_payload_sends_one_empty_chunk() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    respond_ok(&node, 1);

    let mut transaction = transaction(Vec::new(), limits(1024, 20));
    assert_eq!(transaction.required_chunks()?, 1);
    transaction.execute_all(&dispatcher, None).await?;

    let chunks = sent_chunks(&node);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].total, 1);
    assert!(chunks[0].body.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_oversized_payload_rejected_before_any_io() {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));

    let mut transaction = transaction(payload(3000), limits(1024, 2));
    let result = transaction.execute_all(&dispatcher, None).await;

    assert_matches!(result, Err(ExecuteError::IllegalState(message)) if message.contains("more than 2 chunks"));
    assert!(!transaction.is_frozen());
    assert_eq!(node.connect_calls(), 0);
    assert_eq!(node.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_chunk_aborts_sequence() {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    node.push_response(status_response(Status::Ok))
        .push_response(status_response(Status::InvalidChunkNumber));

    let mut transaction = transaction(payload(30), limits(10, 20));
    let result = transaction.execute_all(&dispatcher, None).await;

    assert_matches!(
        result,
        Err(ExecuteError::PrecheckStatus { status: Status::InvalidChunkNumber, transaction_id: Some(id) })
            if id == test_transaction_id().plus_nanos(1)
    );
    assert_eq!(node.request_count(), 2);
    assert_eq!(transaction.cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_transaction_id_without_operator() {
    let (dispatcher, _connector) = dispatcher(1);
    let mut transaction =
        ChunkedTransaction::new(TestChunkBuilder::default(), payload(10), &limits(1024, 20));

    assert_matches!(
        transaction.execute_all(&dispatcher, None).await,
        Err(ExecuteError::IllegalState(_))
    );
}

#[tokio::test(start_paused = true)]
async fn test_operator_generates_id_and_signs_every_chunk() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    respond_ok(&connector.mock(&test_address(0)), 2);

    let payer = AccountId::from_num(1001);
    let operator = Operator { account_id: payer, signer: Arc::new(TestSigner(2)) };
    let mut transaction =
        ChunkedTransaction::new(TestChunkBuilder::default(), payload(20), &limits(10, 20));
    transaction.sign_with(Arc::new(TestSigner(1))).sign_with(Arc::new(TestSigner(1)));

    transaction.execute_all(&dispatcher, Some(&operator)).await?;

    let first = transaction.transaction_id().expect("generated");
    assert_eq!(first.account_id, payer);
    assert_eq!(transaction.transaction_ids()[1], first.plus_nanos(1));
    // chosen by the network since none were set
    assert_eq!(transaction.node_account_ids(), [test_node_account(0)]);

    let counts = transaction.builder().signature_counts.lock().clone();
    assert_eq!(counts.len(), 2);
    assert!(counts.iter().all(|count| *count == 2));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_frozen_transaction_is_immutable() -> eyre::Result<()> {
    let mut transaction =
        ChunkedTransaction::new(TestChunkBuilder::default(), payload(10), &limits(1024, 20));
    transaction.freeze(test_transaction_id(), vec![test_node_account(0)])?;

    assert_matches!(transaction.set_chunk_size(5), Err(ExecuteError::IllegalState(_)));
    assert_matches!(transaction.set_max_chunks(1), Err(ExecuteError::IllegalState(_)));
    assert_matches!(
        transaction.set_node_account_ids(vec![test_node_account(1)]),
        Err(ExecuteError::IllegalState(_))
    );
    assert_matches!(
        transaction.freeze(test_transaction_id(), vec![test_node_account(0)]),
        Err(ExecuteError::IllegalState(_))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_single_chunk_hashes() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    connector.mock(&test_address(0)).push_response(status_response(Status::Ok));

    let mut transaction =
        ChunkedTransaction::new(TestChunkBuilder::default(), payload(10), &limits(1024, 20));
    assert_matches!(transaction.transaction_hash(), Err(ExecuteError::IllegalState(_)));

    let nodes = vec![test_node_account(0), test_node_account(1)];
    transaction.freeze(test_transaction_id(), nodes.clone())?;
    let per_node = transaction.transaction_hash_per_node()?;
    assert_eq!(per_node.len(), 2);
    assert_ne!(per_node[&nodes[0]], per_node[&nodes[1]]);
    assert_eq!(transaction.transaction_hash()?, per_node[&nodes[0]]);

    let response = transaction.execute(&dispatcher, None).await?;
    assert_eq!(response.node_id, nodes[0]);
    assert_eq!(response.transaction_hash, per_node[&nodes[0]]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_multi_chunk_hashes() -> eyre::Result<()> {
    let mut transaction =
        ChunkedTransaction::new(TestChunkBuilder::default(), payload(25), &limits(10, 20));
    let nodes = vec![test_node_account(0), test_node_account(1)];
    transaction.freeze(test_transaction_id(), nodes.clone())?;

    assert_matches!(transaction.transaction_hash(), Err(ExecuteError::IllegalState(_)));
    assert_matches!(transaction.transaction_hash_per_node(), Err(ExecuteError::IllegalState(_)));

    let all = transaction.all_transaction_hashes_per_node()?;
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|hashes| hashes.len() == nodes.len()));
    let distinct: std::collections::HashSet<TransactionHash> =
        all.iter().map(|hashes| hashes[&nodes[0]]).collect();
    assert_eq!(distinct.len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_each_chunk_waits_for_its_receipt() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    node.push_response(status_response(Status::Ok))
        .push_response(receipt_response(Status::Ok, Status::Unknown))
        .push_response(receipt_response(Status::Ok, Status::Success))
        .push_response(status_response(Status::Ok))
        .push_response(receipt_response(Status::Ok, Status::Success));

    let mut transaction = transaction(payload(15), limits(10, 20));
    transaction.set_receipt_waiter(Arc::new(ReceiptFetcher::new(Arc::new(TestReceiptCodec))));
    transaction.execute_all(&dispatcher, None).await?;

    let methods: Vec<_> = node.requests().into_iter().map(|(method, _)| method).collect();
    assert_eq!(methods, vec![CHUNK, RECEIPT, RECEIPT, CHUNK, RECEIPT]);

    let (_, query) = &node.requests()[4];
    assert_eq!(query, &test_transaction_id().plus_nanos(1).to_string().into_bytes());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_receipt_stops_remaining_chunks() {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    node.push_response(status_response(Status::Ok))
        .push_response(receipt_response(Status::Ok, Status::InvalidSignature));

    let mut transaction = transaction(payload(15), limits(10, 20));
    transaction.set_receipt_waiter(Arc::new(ReceiptFetcher::new(Arc::new(TestReceiptCodec))));
    let result = transaction.execute_all(&dispatcher, None).await;

    assert_matches!(
        result,
        Err(ExecuteError::ReceiptStatus { status: Status::InvalidSignature, transaction_id })
            if transaction_id == test_transaction_id()
    );
    assert_eq!(node.request_count(), 2);
    assert_eq!(transaction.cursor(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_chunks_reassemble_payload(len in 0usize..2048, chunk_size in 1usize..512) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime");

        let data = payload(len);
        let expected = len.div_ceil(chunk_size).max(1);
        let chunks = runtime.block_on(async {
            let (dispatcher, connector) = dispatcher(1);
            let node = connector.mock(&test_address(0));
            respond_ok(&node, expected);
            let mut transaction = transaction(data.clone(), limits(chunk_size, usize::MAX));
            transaction.execute_all(&dispatcher, None).await.expect("submitted");
            sent_chunks(&node)
        });

        prop_assert_eq!(chunks.len(), expected);
        prop_assert!(chunks.iter().all(|chunk| chunk.body.len() <= chunk_size));
        prop_assert_eq!(concat_bodies(&chunks), data);
    }
}
