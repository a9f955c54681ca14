//! Per-endpoint backoff state.
//!
//! Failures double the backoff up to the configured maximum and push the readmit time into the
//! future. Successful responses halve it back toward the minimum.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Backoff state for one endpoint, safe to share across concurrent requests.
#[derive(Debug)]
pub struct NodeHealth {
    /// Lower bound of `current_backoff`.
    min_backoff: Duration,
    /// Upper bound of `current_backoff`.
    max_backoff: Duration,
    /// Mutable state. Updates are applied under the lock so concurrent callers never lose one.
    state: Mutex<HealthState>,
}

#[derive(Debug, Clone, Copy)]
struct HealthState {
    /// Backoff applied on the next failure.
    current_backoff: Duration,
    /// Total failures since creation.
    bad_attempts: u32,
    /// The endpoint is healthy once this instant has passed.
    readmit_time: Instant,
    /// Time of the latest failure.
    last_failure: Option<Instant>,
}

impl NodeHealth {
    /// Create a healthy record. `min_backoff` is clamped to `max_backoff`.
    pub fn new(min_backoff: Duration, max_backoff: Duration) -> Self {
        let min_backoff = min_backoff.min(max_backoff);
        Self {
            min_backoff,
            max_backoff,
            state: Mutex::new(HealthState {
                current_backoff: min_backoff,
                bad_attempts: 0,
                readmit_time: Instant::now(),
                last_failure: None,
            }),
        }
    }

    /// Record a failure.
    ///
    /// The endpoint is unhealthy for the current backoff, and the backoff doubles for next time.
    pub fn increase_backoff(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.bad_attempts = state.bad_attempts.saturating_add(1);
        state.readmit_time = now + state.current_backoff;
        state.last_failure = Some(now);
        state.current_backoff = state.current_backoff.saturating_mul(2).min(self.max_backoff);
    }

    /// Record a successful exchange.
    pub fn decrease_backoff(&self) {
        let mut state = self.state.lock();
        state.current_backoff = (state.current_backoff / 2).max(self.min_backoff);
    }

    /// Whether the endpoint may be used now.
    pub fn is_healthy(&self) -> bool {
        self.state.lock().readmit_time <= Instant::now()
    }

    /// Time left until the endpoint is healthy again. Zero when healthy.
    pub fn remaining_backoff(&self) -> Duration {
        self.state.lock().readmit_time.saturating_duration_since(Instant::now())
    }

    /// The instant the endpoint becomes healthy.
    pub fn readmit_time(&self) -> Instant {
        self.state.lock().readmit_time
    }

    /// The backoff the next failure applies.
    pub fn current_backoff(&self) -> Duration {
        self.state.lock().current_backoff
    }

    /// Total failures recorded.
    pub fn bad_attempts(&self) -> u32 {
        self.state.lock().bad_attempts
    }

    /// Time of the latest failure, if any.
    pub fn last_failure(&self) -> Option<Instant> {
        self.state.lock().last_failure
    }

    /// Lower backoff bound.
    pub fn min_backoff(&self) -> Duration {
        self.min_backoff
    }

    /// Upper backoff bound.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }
}
