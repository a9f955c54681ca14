//! Retry, failover and classification in the dispatch loop.

use crate::common::{dispatcher, status_response, TestRequest, SUBMIT};
use assert_matches::assert_matches;
use lc_config::ExecutionOverrides;
use lc_executor::ExecuteError;
use lc_network::NetworkError;
use lc_test_utils::{test_address, test_node_account, test_transaction_id};
use lc_types::{AccountId, Status};
use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;
use tonic::{Code, Status as GrpcStatus};

fn all_nodes(size: u8) -> Vec<AccountId> {
    (0..size).map(test_node_account).collect()
}

#[tokio::test(start_paused = true)]
async fn test_fails_over_unavailable_nodes() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(3);
    connector.mock(&test_address(0)).push_error(GrpcStatus::unavailable("down"));
    connector.mock(&test_address(1)).push_error(GrpcStatus::unavailable("down"));
    connector.mock(&test_address(2)).push_response(status_response(Status::Ok));

    let mut request = TestRequest::to(all_nodes(3));
    let (node, status) = dispatcher.execute(&mut request).await?;
    assert_eq!(node, test_node_account(2));
    assert_eq!(status, Status::Ok);

    let network = dispatcher.network();
    for failed in [0, 1] {
        let proxies = network.node_proxies(test_node_account(failed))?;
        let health = proxies[0].health();
        assert_eq!(health.bad_attempts(), 1);
        assert_eq!(health.current_backoff(), health.min_backoff() * 2);
        assert!(!health.is_healthy());
    }
    let proxies = network.node_proxies(test_node_account(2))?;
    let health = proxies[0].health();
    assert_eq!(health.bad_attempts(), 0);
    assert_eq!(health.current_backoff(), health.min_backoff());

    for i in 0..3 {
        assert_eq!(connector.mock(&test_address(i)).request_count(), 1);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_each_request_is_built_for_its_node() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    connector.mock(&test_address(0)).push_error(GrpcStatus::resource_exhausted("full"));
    connector.mock(&test_address(1)).push_response(status_response(Status::Success));

    dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await?;

    let (method, body) = connector.mock(&test_address(0)).requests().remove(0);
    assert_eq!(method, SUBMIT);
    assert_eq!(body, format!("request for {}", test_node_account(0)).into_bytes());
    let (_, body) = connector.mock(&test_address(1)).requests().remove(0);
    assert_eq!(body, format!("request for {}", test_node_account(1)).into_bytes());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_nodes_chosen_when_request_names_none() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(3);
    for i in 0..3 {
        connector.mock(&test_address(i)).push_response(status_response(Status::Ok));
    }

    let mut request = TestRequest::default();
    let (node, _) = dispatcher.execute(&mut request).await?;

    // a third of three nodes
    assert_eq!(request.node_account_ids, vec![node]);
    let sent: usize = (0..3).map(|i| connector.mock(&test_address(i)).request_count()).sum();
    assert_eq!(sent, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_skips_submission() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    let unreachable = connector.mock(&test_address(0));
    unreachable.push_connect(false);
    connector.mock(&test_address(1)).push_response(status_response(Status::Ok));

    let (node, _) = dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await?;
    assert_eq!(node, test_node_account(1));
    assert_eq!(unreachable.connect_calls(), 1);
    assert_eq!(unreachable.request_count(), 0);

    let proxies = dispatcher.network().node_proxies(test_node_account(0))?;
    assert_eq!(proxies[0].health().bad_attempts(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_fatal_precheck_is_not_retried() {
    let (dispatcher, connector) = dispatcher(3);
    connector.mock(&test_address(0)).push_response(status_response(Status::InvalidSignature));

    let mut request = TestRequest::to(all_nodes(3));
    request.transaction_id = Some(test_transaction_id());
    let result = dispatcher.execute(&mut request).await;

    assert_matches!(
        result,
        Err(ExecuteError::PrecheckStatus { status: Status::InvalidSignature, transaction_id: Some(id) })
            if id == test_transaction_id()
    );
    let sent: usize = (0..3).map(|i| connector.mock(&test_address(i)).request_count()).sum();
    assert_eq!(sent, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unrecognized_status_is_fatal() {
    let (dispatcher, connector) = dispatcher(1);
    connector.mock(&test_address(0)).push_response(status_response(Status::Unrecognized(9999)));

    let result = dispatcher.execute(&mut TestRequest::to(all_nodes(1))).await;
    assert_matches!(
        result,
        Err(ExecuteError::PrecheckStatus { status: Status::Unrecognized(9999), transaction_id: None })
    );
}

#[tokio::test(start_paused = true)]
async fn test_platform_errors_fail_over() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    connector.mock(&test_address(0)).push_response(status_response(Status::PlatformNotActive));
    connector.mock(&test_address(1)).push_response(status_response(Status::Ok));

    let start = Instant::now();
    let (node, _) = dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await?;
    assert_eq!(node, test_node_account(1));
    // server errors move on immediately
    assert_eq!(start.elapsed(), Duration::ZERO);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_all_busy_backs_off_before_next_round() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    connector
        .mock(&test_address(0))
        .push_response(status_response(Status::Busy))
        .push_response(status_response(Status::Ok));
    connector.mock(&test_address(1)).push_response(status_response(Status::Busy));

    let start = Instant::now();
    let (node, _) = dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await?;

    assert_eq!(node, test_node_account(0));
    let elapsed = start.elapsed();
    let expected = dispatcher.config().min_backoff;
    assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(1), "{elapsed:?}");
    assert_eq!(connector.mock(&test_address(0)).request_count(), 2);
    assert_eq!(connector.mock(&test_address(1)).request_count(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_throttled_retries_double_the_call_backoff() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    for _ in 0..3 {
        node.push_response(status_response(Status::ThrottledAtConsensus));
    }
    node.push_response(status_response(Status::Ok));

    let mut request = TestRequest::to(all_nodes(1));
    request.overrides = ExecutionOverrides::default()
        .with_backoff(Duration::from_millis(250), Duration::from_secs(8));
    let start = Instant::now();
    dispatcher.execute(&mut request).await?;

    let elapsed = start.elapsed();
    let expected = Duration::from_millis(250 + 500 + 1000);
    assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(1), "{elapsed:?}");
    assert_eq!(node.request_count(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overall_deadline_stops_retries() {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    for _ in 0..10 {
        node.push_response(status_response(Status::ThrottledAtConsensus));
    }

    let mut request = TestRequest::to(all_nodes(1));
    request.overrides = ExecutionOverrides::default()
        .with_backoff(Duration::from_millis(400), Duration::from_millis(400))
        .with_request_timeout(Duration::from_secs(1));
    let start = Instant::now();
    let result = dispatcher.execute(&mut request).await;

    let err = result.expect_err("deadline passed");
    assert!(err.is_exhaustion());
    assert_matches!(err, ExecuteError::Timeout { timeout } if timeout == Duration::from_secs(1));
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(node.request_count(), 3);
    assert_eq!(node.deadlines()[0], start + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_attempt_deadline_is_grpc_deadline_when_shorter() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    node.push_response(status_response(Status::Ok));

    let mut request = TestRequest::to(all_nodes(1));
    request.overrides = ExecutionOverrides::default().with_grpc_deadline(Duration::from_secs(3));
    let start = Instant::now();
    dispatcher.execute(&mut request).await?;

    assert_eq!(node.deadlines(), vec![start + Duration::from_secs(3)]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_attempt_deadline_starts_after_node_backoff() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    node.push_error(GrpcStatus::unavailable("down"))
        .push_response(status_response(Status::Ok));

    let mut request = TestRequest::to(all_nodes(1));
    request.overrides =
        ExecutionOverrides::default().with_grpc_deadline(Duration::from_millis(500));
    let start = Instant::now();
    let (_, status) = dispatcher.execute(&mut request).await?;

    assert_eq!(status, Status::Ok);
    // the retry waits out the 1s node backoff before its deadline is set
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(
        node.deadlines(),
        vec![start + Duration::from_millis(500), start + Duration::from_millis(1500)]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_node_backoff_wait_is_bounded_by_call_deadline() {
    let (dispatcher, connector) = dispatcher(1);
    let node = connector.mock(&test_address(0));
    node.push_response(status_response(Status::Ok));

    // readmitted 16s from now
    let proxies = dispatcher.network().node_proxies(test_node_account(0)).expect("known node");
    for _ in 0..5 {
        proxies[0].increase_backoff();
    }
    assert_eq!(proxies[0].remaining_backoff(), Duration::from_secs(16));

    let mut request = TestRequest::to(all_nodes(1));
    request.overrides =
        ExecutionOverrides::default().with_request_timeout(Duration::from_secs(5));
    let start = Instant::now();
    let result = dispatcher.execute(&mut request).await;

    assert_matches!(result, Err(ExecuteError::Timeout { timeout }) if timeout == Duration::from_secs(5));
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(node.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_deadline_exceeded_fails_over() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    connector.mock(&test_address(0)).push_error(GrpcStatus::deadline_exceeded("slow"));
    connector.mock(&test_address(1)).push_response(status_response(Status::Ok));

    let (node, _) = dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await?;
    assert_eq!(node, test_node_account(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_transport_error_is_fatal() {
    let (dispatcher, connector) = dispatcher(2);
    connector.mock(&test_address(0)).push_error(GrpcStatus::invalid_argument("bad frame"));

    let result = dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await;
    assert_matches!(
        result,
        Err(ExecuteError::Transport { code: Code::InvalidArgument, message }) if message == "bad frame"
    );
    assert_eq!(connector.mock(&test_address(1)).request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_node_is_rejected_before_submission() {
    let (dispatcher, connector) = dispatcher(2);
    let unknown = AccountId::from_num(99);

    let result = dispatcher.execute(&mut TestRequest::to(vec![unknown])).await;
    assert_matches!(result, Err(ExecuteError::Network(NetworkError::UnknownNode(id))) if id == unknown);
    assert_eq!(connector.mock(&test_address(0)).connect_calls(), 0);
    assert_eq!(connector.mock(&test_address(1)).connect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_overrides_are_rejected() {
    let (dispatcher, _connector) = dispatcher(1);
    let mut request = TestRequest::to(all_nodes(1));
    request.overrides = ExecutionOverrides::default()
        .with_backoff(Duration::from_secs(2), Duration::from_secs(1));

    assert_matches!(dispatcher.execute(&mut request).await, Err(ExecuteError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_node_health() -> eyre::Result<()> {
    let (dispatcher, connector) = dispatcher(2);
    let healthy = connector.mock(&test_address(1));
    for _ in 0..8 {
        healthy.push_response(status_response(Status::Ok));
    }

    let calls = (0..8).map(|_| {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.execute(&mut TestRequest::to(all_nodes(2))).await })
    });
    for call in futures::future::join_all(calls).await {
        let (node, _) = call??;
        assert_eq!(node, test_node_account(1));
    }

    // the unscripted node fails until its backoff keeps it out of selection
    let proxies = dispatcher.network().node_proxies(test_node_account(0))?;
    assert!(proxies[0].health().bad_attempts() >= 1);
    assert_eq!(healthy.request_count(), 8);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_attempts_bounded_by_max_attempts(max_attempts in 1u32..8, size in 1u8..4) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("runtime");

        let (sent, result) = runtime.block_on(async {
            let (dispatcher, connector) = dispatcher(size);
            let mut request = TestRequest::to(all_nodes(size));
            request.overrides = ExecutionOverrides::default()
                .with_max_attempts(max_attempts)
                .with_request_timeout(Duration::from_secs(3600));
            let result = dispatcher.execute(&mut request).await;
            let sent: usize = (0..size).map(|i| connector.mock(&test_address(i)).request_count()).sum();
            (sent, result)
        });

        prop_assert_eq!(sent, max_attempts as usize);
        let is_max_attempts = matches!(
            result,
            Err(ExecuteError::MaxAttemptsExceeded { attempts, .. }) if attempts == max_attempts
        );
        prop_assert!(is_max_attempts);
    }
}
