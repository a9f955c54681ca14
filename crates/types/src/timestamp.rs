//! Ledger timestamps with nanosecond resolution.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Seconds and nanoseconds since the unix epoch.
///
/// One nanosecond is the minimal unit that separates consecutive chunk transaction ids and the
/// step a subscription cursor advances past the last delivered message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds.
    pub seconds: i64,
    /// Nanoseconds within the second, always `< 1_000_000_000`.
    pub nanos: u32,
}

impl Timestamp {
    /// Create a normalized timestamp. Seconds saturate at `i64::MAX`.
    pub fn new(seconds: i64, nanos: u64) -> Self {
        let carry = (nanos / NANOS_PER_SECOND) as i64;
        Self { seconds: seconds.saturating_add(carry), nanos: (nanos % NANOS_PER_SECOND) as u32 }
    }

    /// The current wall clock time.
    pub fn now() -> Self {
        SystemTime::now().into()
    }

    /// Return a timestamp `nanos` later than `self`.
    pub fn plus_nanos(self, nanos: u64) -> Self {
        Self::new(self.seconds, u64::from(self.nanos).saturating_add(nanos))
    }

    /// Return a timestamp `duration` earlier than `self`.
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let total = self.as_nanos().saturating_sub(duration.as_nanos() as i128);
        Self::from_nanos(total)
    }

    /// Total nanoseconds since the epoch.
    pub fn as_nanos(&self) -> i128 {
        i128::from(self.seconds) * i128::from(NANOS_PER_SECOND) + i128::from(self.nanos)
    }

    fn from_nanos(total: i128) -> Self {
        let per = i128::from(NANOS_PER_SECOND);
        Self { seconds: total.div_euclid(per) as i64, nanos: total.rem_euclid(per) as u32 }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(since) => Self::new(since.as_secs() as i64, u64::from(since.subsec_nanos())),
            Err(before) => Self::from_nanos(-(before.duration().as_nanos() as i128)),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}
