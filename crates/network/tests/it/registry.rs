//! Registry admission, selection and readmission.

use assert_matches::assert_matches;
use lc_config::NetworkConfig;
use lc_network::{Network, NetworkError};
use lc_test_utils::{test_address, test_network_map, test_node_account, MockConnector};
use lc_types::{AccountId, NodeAddress};
use std::{collections::HashSet, sync::Arc, time::Duration};

fn config() -> NetworkConfig {
    NetworkConfig {
        min_node_backoff: Duration::from_secs(1),
        max_node_backoff: Duration::from_secs(16),
        min_readmit_time: Duration::from_secs(1),
        max_readmit_time: Duration::from_secs(60),
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_account_resolves_to_all_proxies() -> eyre::Result<()> {
    let connector = MockConnector::shared();
    let mut map = test_network_map(3);
    let proxy = NodeAddress::new("10.1.1.1", 50211);
    map.insert(proxy.clone(), test_node_account(0));
    let network = Network::from_map(&map, config(), connector);

    let proxies = network.nodes_for(&[test_node_account(0)])?;
    assert_eq!(proxies.len(), 2);
    assert!(proxies.iter().all(|node| node.account_id() == test_node_account(0)));
    assert!(proxies.iter().any(|node| node.address() == &proxy));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_many_accounts_resolve_to_one_proxy_each() -> eyre::Result<()> {
    let connector = MockConnector::shared();
    let mut map = test_network_map(3);
    map.insert(NodeAddress::new("10.1.1.1", 50211), test_node_account(0));
    let network = Network::from_map(&map, config(), connector);

    let targets = [test_node_account(0), test_node_account(1), test_node_account(2)];
    let nodes = network.nodes_for(&targets)?;
    let resolved: Vec<AccountId> = nodes.iter().map(|node| node.account_id()).collect();
    assert_eq!(resolved, targets);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unknown_or_missing_targets_are_illegal() {
    let network = Network::from_map(&test_network_map(2), config(), MockConnector::shared());

    assert_matches!(
        network.nodes_for(&[AccountId::from_num(99)]),
        Err(NetworkError::UnknownNode(id)) if id == AccountId::from_num(99)
    );
    assert_matches!(
        network.nodes_for(&[test_node_account(0), AccountId::from_num(99)]),
        Err(NetworkError::UnknownNode(_))
    );
    assert_matches!(network.nodes_for(&[]), Err(NetworkError::NoNodeAccountIds));
}

#[tokio::test(start_paused = true)]
async fn test_set_network_keeps_surviving_nodes() {
    let connector = MockConnector::shared();
    let network = Network::from_map(&test_network_map(3), config(), connector.clone());
    let before = network.nodes_for(&[test_node_account(1)]).unwrap().remove(0);
    before.increase_backoff();

    let mut map = test_network_map(2);
    map.insert(NodeAddress::new("10.9.9.9", 50211), AccountId::from_num(42));
    network.set_network(&map);

    let after = network.nodes_for(&[test_node_account(1)]).unwrap().remove(0);
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.health().bad_attempts(), 1);
    assert!(connector.mock(&test_address(2)).is_closed());
    assert_matches!(
        network.nodes_for(&[test_node_account(2)]),
        Err(NetworkError::UnknownNode(_))
    );
    assert_eq!(network.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_admit_and_evict() {
    let connector = MockConnector::shared();
    let network = Network::new(config(), connector.clone());
    assert!(network.is_empty());

    network.admit(test_address(0), test_node_account(0));
    network.admit(test_address(1), test_node_account(0));
    assert_eq!(network.node_proxies(test_node_account(0)).unwrap().len(), 2);

    assert!(network.evict(&test_address(0)));
    assert!(!network.evict(&test_address(0)));
    assert!(connector.mock(&test_address(0)).is_closed());
    assert_eq!(network.node_proxies(test_node_account(0)).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_execute_nodes_default_to_a_third() -> eyre::Result<()> {
    let network = Network::from_map(&test_network_map(9), config(), MockConnector::shared());
    let ids = network.node_account_ids_for_execute().await?;
    assert_eq!(ids.len(), 3);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);

    let limited = NetworkConfig { max_nodes_per_request: Some(5), ..config() };
    let network = Network::from_map(&test_network_map(9), limited, MockConnector::shared());
    assert_eq!(network.node_account_ids_for_execute().await?.len(), 5);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_execute_nodes_skip_unhealthy() -> eyre::Result<()> {
    let limited = NetworkConfig { max_nodes_per_request: Some(3), ..config() };
    let network = Network::from_map(&test_network_map(3), limited, MockConnector::shared());
    network.nodes_for(&[test_node_account(0)])?[0].increase_backoff();

    let ids = network.node_account_ids_for_execute().await?;
    assert_eq!(ids.len(), 2);
    assert!(!ids.contains(&test_node_account(0)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_execute_nodes_wait_for_readmission() -> eyre::Result<()> {
    let network = Network::from_map(&test_network_map(1), config(), MockConnector::shared());
    network.nodes_for(&[test_node_account(0)])?[0].increase_backoff();

    let start = tokio::time::Instant::now();
    let ids = network.node_account_ids_for_execute().await?;
    assert_eq!(ids, vec![test_node_account(0)]);
    assert!(start.elapsed() >= Duration::from_secs(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_nodes_over_attempt_limit_are_evicted() -> eyre::Result<()> {
    let connector = MockConnector::shared();
    let limited = NetworkConfig { max_node_attempts: Some(2), ..config() };
    let network = Network::from_map(&test_network_map(3), limited, connector.clone());
    let node = network.nodes_for(&[test_node_account(1)])?.remove(0);
    node.increase_backoff();
    node.increase_backoff();

    network.node_account_ids_for_execute().await?;
    assert_eq!(network.len(), 2);
    assert!(connector.mock(&test_address(1)).is_closed());
    assert_matches!(network.nodes_for(&[test_node_account(1)]), Err(NetworkError::UnknownNode(_)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_network_cannot_choose_nodes() {
    let network = Network::new(config(), MockConnector::shared());
    assert_matches!(network.node_account_ids_for_execute().await, Err(NetworkError::EmptyNetwork));
}
