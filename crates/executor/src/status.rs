//! Classification of precheck statuses into retry decisions.

use lc_types::Status;

/// What the dispatcher does after a node answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    /// Map and return the response.
    Success,
    /// The node cannot serve the request right now. Try the next node immediately.
    ServerError,
    /// The network asked the client to slow down. Sleep the call backoff, then try again.
    Retry,
    /// Fatal. Surface the status to the caller.
    RequestError,
}

/// Map a precheck status to the dispatcher's next action.
pub fn classify(status: Status) -> ExecutionStatus {
    match status {
        Status::Ok | Status::Success => ExecutionStatus::Success,
        Status::PlatformTransactionNotCreated | Status::PlatformNotActive | Status::Busy => {
            ExecutionStatus::ServerError
        }
        Status::ThrottledAtConsensus => ExecutionStatus::Retry,
        _ => ExecutionStatus::RequestError,
    }
}
