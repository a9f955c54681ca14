//! The schema seam between the subscription loop and the mirror protocol.

use crate::SubscriptionResult;
use lc_network::GrpcMethod;
use lc_types::{Timestamp, TopicId, TopicResponse};

/// Where a (re)connected stream starts.
///
/// Advanced past every item received so a reconnect never redelivers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionCursor {
    /// The topic.
    pub topic_id: TopicId,
    /// Earliest consensus time to deliver.
    pub start_time: Option<Timestamp>,
    /// Latest consensus time to deliver. Open-ended when unset.
    pub end_time: Option<Timestamp>,
    /// Items still to deliver. Unbounded when unset.
    pub limit: Option<u64>,
}

impl SubscriptionCursor {
    /// Move past an item with `consensus_timestamp`.
    pub fn advance(&mut self, consensus_timestamp: Timestamp) {
        self.start_time = Some(consensus_timestamp.plus_nanos(1));
        if let Some(limit) = self.limit.as_mut() {
            *limit = limit.saturating_sub(1);
        }
    }

    /// Whether a bounded subscription has delivered everything it asked for.
    pub fn is_exhausted(&self) -> bool {
        self.limit == Some(0)
    }
}

/// Encodes subscription queries and decodes pushed items.
pub trait TopicMessageCodec: Send + Sync + 'static {
    /// The server-streaming method to call.
    fn method(&self) -> GrpcMethod;

    /// Encode the query for the current cursor.
    fn encode_query(&self, cursor: &SubscriptionCursor) -> SubscriptionResult<Vec<u8>>;

    /// Decode one streamed item.
    fn decode_response(&self, item: &[u8]) -> SubscriptionResult<TopicResponse>;
}
