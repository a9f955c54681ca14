//! Request execution against a set of consensus nodes.
//!
//! [`Dispatcher`] drives any [`Executable`] through node selection, submission, status
//! classification and retry. [`ChunkedTransaction`] splits oversized payloads and drives the
//! dispatcher once per chunk.

mod chunked;
mod dispatcher;
pub mod error;
mod executable;
mod receipt;
mod status;

pub use chunked::{Chunk, ChunkBuilder, ChunkedTransaction};
pub use dispatcher::{Dispatcher, Operator, RequestAttemptState};
pub use error::{ExecuteError, ExecuteResult};
pub use executable::Executable;
pub use receipt::{ReceiptCodec, ReceiptFetcher, ReceiptQuery, ReceiptWaiter};
pub use status::{classify, ExecutionStatus};
