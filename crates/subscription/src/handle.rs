//! Control over a running subscription.

use crate::{SubscriptionError, SubscriptionResult};
use std::fmt;
use tokio::{sync::watch, task::JoinHandle};

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// Looking for a mirror endpoint and opening the stream.
    Connecting,
    /// Receiving items.
    Streaming,
    /// Waiting out the backoff after a stream failure.
    Reconnecting,
    /// The server ended the stream cleanly.
    Completed,
    /// The stream failed and was not retried.
    Failed,
    /// Stopped by [`SubscriptionHandle::unsubscribe`].
    Cancelled,
}

impl SubscriptionState {
    /// Whether the subscription has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Handle to a subscription task.
///
/// Dropping the handle leaves the subscription running. Call [`Self::unsubscribe`] to stop it.
#[derive(Debug)]
pub struct SubscriptionHandle {
    cancel: watch::Sender<bool>,
    state: watch::Receiver<SubscriptionState>,
    task: JoinHandle<SubscriptionState>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        cancel: watch::Sender<bool>,
        state: watch::Receiver<SubscriptionState>,
        task: JoinHandle<SubscriptionState>,
    ) -> Self {
        Self { cancel, state, task }
    }

    /// Stop the subscription.
    ///
    /// An open stream is dropped and no reconnect is attempted. Neither the error nor the
    /// completion handler runs.
    pub fn unsubscribe(&self) {
        self.cancel.send_replace(true);
    }

    /// A receiver that observes every state change.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// The latest state.
    pub fn current_state(&self) -> SubscriptionState {
        *self.state.borrow()
    }

    /// Whether the subscription task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the subscription to stop and return its terminal state.
    pub async fn join(self) -> SubscriptionResult<SubscriptionState> {
        self.task.await.map_err(|err| SubscriptionError::Task(err.to_string()))
    }
}
