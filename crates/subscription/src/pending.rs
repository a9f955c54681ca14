//! Reassembly of multi-part topic messages.

use lc_types::{TopicMessage, TopicResponse, TransactionId};
use std::collections::HashMap;
use tracing::trace;

/// Parts of multi-part messages received so far, keyed by the initial transaction id.
///
/// Survives reconnects: parts received before a stream failure are not redelivered.
#[derive(Debug, Default)]
pub struct PendingMessageBuffer {
    pending: HashMap<TransactionId, Vec<TopicResponse>>,
}

impl PendingMessageBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stream item and return the message it completes, if any.
    ///
    /// Single-part items complete immediately. A multi-part message completes when the number
    /// of parts received equals its declared total, and is then removed from the buffer.
    pub fn push(&mut self, response: TopicResponse) -> Option<TopicMessage> {
        let Some(info) = response.chunk_info.filter(|info| info.total > 1) else {
            return Some(TopicMessage::of_single(response));
        };

        let key = info.initial_transaction_id;
        let parts = self.pending.entry(key).or_default();
        parts.push(response);
        trace!(target: "subscription", initial=%key, received=parts.len(), total=info.total, "buffered message part");
        if parts.len() < info.total as usize {
            return None;
        }

        self.pending.remove(&key).and_then(TopicMessage::of_many)
    }

    /// Parts held for `initial_transaction_id`.
    pub fn parts(&self, initial_transaction_id: &TransactionId) -> usize {
        self.pending.get(initial_transaction_id).map_or(0, Vec::len)
    }

    /// Number of incomplete messages.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no message is waiting for parts.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
