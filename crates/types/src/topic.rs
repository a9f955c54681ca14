//! Messages pushed by a mirror node topic subscription.

use crate::{Timestamp, TransactionId};
use bytes::{Bytes, BytesMut};

/// Chunk metadata attached to one part of a multi-part message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Id of the first chunk. Every part of the message carries the same value.
    pub initial_transaction_id: TransactionId,
    /// Declared number of parts.
    pub total: u32,
    /// One-based position of this part.
    pub number: u32,
}

/// One decoded item from the subscription stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicResponse {
    /// Consensus time of this item.
    pub consensus_timestamp: Timestamp,
    /// Message payload.
    pub contents: Bytes,
    /// Running hash of the topic after this item.
    pub running_hash: Bytes,
    /// Sequence number of this item within the topic.
    pub sequence_number: u64,
    /// Present when the item is one part of a multi-part message.
    pub chunk_info: Option<ChunkInfo>,
}

impl TopicResponse {
    /// Whether this item is a complete message by itself.
    pub fn is_single_part(&self) -> bool {
        self.chunk_info.is_none_or(|info| info.total <= 1)
    }
}

/// Per-part metadata kept on a reassembled message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMessageChunk {
    /// Consensus time of the part.
    pub consensus_timestamp: Timestamp,
    /// Size of the part's contents.
    pub content_size: usize,
    /// Running hash after the part.
    pub running_hash: Bytes,
    /// Sequence number of the part.
    pub sequence_number: u64,
}

impl From<&TopicResponse> for TopicMessageChunk {
    fn from(response: &TopicResponse) -> Self {
        Self {
            consensus_timestamp: response.consensus_timestamp,
            content_size: response.contents.len(),
            running_hash: response.running_hash.clone(),
            sequence_number: response.sequence_number,
        }
    }
}

/// A complete message delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMessage {
    /// Consensus time of the message (of the last part for multi-part messages).
    pub consensus_timestamp: Timestamp,
    /// Full message contents.
    pub contents: Bytes,
    /// Running hash after the message.
    pub running_hash: Bytes,
    /// Sequence number of the message.
    pub sequence_number: u64,
    /// Parts the message was assembled from. Empty for single-part messages.
    pub chunks: Vec<TopicMessageChunk>,
    /// Transaction id that submitted the message, when known.
    pub transaction_id: Option<TransactionId>,
}

impl TopicMessage {
    /// A message made of exactly one stream item.
    pub fn of_single(response: TopicResponse) -> Self {
        Self {
            consensus_timestamp: response.consensus_timestamp,
            transaction_id: response.chunk_info.map(|info| info.initial_transaction_id),
            chunks: Vec::new(),
            contents: response.contents,
            running_hash: response.running_hash,
            sequence_number: response.sequence_number,
        }
    }

    /// Reassemble a multi-part message.
    ///
    /// Contents are concatenated in chunk-number order. Timestamp, running hash and sequence
    /// number come from the last part. Returns `None` for an empty slice.
    pub fn of_many(mut parts: Vec<TopicResponse>) -> Option<Self> {
        parts.sort_by_key(|part| part.chunk_info.map_or(0, |info| info.number));
        let last = parts.last()?.clone();

        let size = parts.iter().map(|part| part.contents.len()).sum();
        let mut contents = BytesMut::with_capacity(size);
        for part in &parts {
            contents.extend_from_slice(&part.contents);
        }

        Some(Self {
            consensus_timestamp: last.consensus_timestamp,
            transaction_id: parts
                .first()
                .and_then(|part| part.chunk_info)
                .map(|info| info.initial_transaction_id),
            chunks: parts.iter().map(TopicMessageChunk::from).collect(),
            contents: contents.freeze(),
            running_hash: last.running_hash,
            sequence_number: last.sequence_number,
        })
    }
}
