//! Results returned to callers after a request was accepted by a node.

use crate::{AccountId, Status, TransactionId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};
use std::fmt;

/// SHA-384 of the signed request bytes submitted to one node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(#[serde(with = "serde_with::As::<serde_with::hex::Hex>")] pub [u8; 48]);

impl TransactionHash {
    /// Hash the signed request bytes.
    pub fn of(signed_bytes: &[u8]) -> Self {
        Self(Sha384::digest(signed_bytes).into())
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionHash({self})")
    }
}

/// The node's acknowledgement that it accepted a transaction for consensus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    /// The node that accepted the transaction.
    pub node_id: AccountId,
    /// Hash of the exact bytes the node received.
    pub transaction_hash: TransactionHash,
    /// The transaction's id.
    pub transaction_id: TransactionId,
}

/// The post-consensus outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// The transaction this receipt belongs to.
    pub transaction_id: TransactionId,
    /// Consensus status of the transaction.
    pub status: Status,
}

/// A public key and the signature it produced over one request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignaturePair {
    /// Encoded public key.
    pub public_key: Vec<u8>,
    /// Signature bytes.
    pub signature: Vec<u8>,
}
