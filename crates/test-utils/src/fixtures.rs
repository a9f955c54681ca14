//! Addresses and ids for tests.

use lc_types::{AccountId, NodeAddress, Timestamp, TransactionId};
use std::collections::BTreeMap;

/// Plaintext address for test node `index`.
pub fn test_address(index: u8) -> NodeAddress {
    NodeAddress::new(format!("127.0.0.{}", index + 1), 50211)
}

/// Account for test node `index`: `0.0.(3 + index)`.
pub fn test_node_account(index: u8) -> AccountId {
    AccountId::from_num(3 + u64::from(index))
}

/// A network of `size` nodes with one endpoint each.
pub fn test_network_map(size: u8) -> BTreeMap<NodeAddress, AccountId> {
    (0..size).map(|i| (test_address(i), test_node_account(i))).collect()
}

/// A fixed transaction id.
pub fn test_transaction_id() -> TransactionId {
    TransactionId::with_valid_start(AccountId::from_num(1001), Timestamp::new(1_700_000_000, 0))
}
