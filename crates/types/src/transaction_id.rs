//! Transaction identifiers.

use crate::{error::ParseIdError, AccountId, Timestamp};
use rand::Rng as _;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr, time::Duration};

/// Valid start times are backdated by a random amount in this range so a transaction built on a
/// client whose clock runs slightly ahead is still accepted by the network.
const BACKDATE_MILLIS: std::ops::Range<u64> = 5_000..8_000;

/// Digits in a full nanosecond fraction.
const NANO_DIGITS: usize = 9;

/// Parse the decimal fraction after `seconds.` as nanoseconds, so `5` is half a second.
fn parse_fraction(fraction: &str) -> Result<u64, ParseIdError> {
    let invalid = || ParseIdError::InvalidNumber(fraction.to_string());
    if fraction.is_empty()
        || fraction.len() > NANO_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }
    let value: u64 = fraction.parse().map_err(|_| invalid())?;
    Ok(value * 10u64.pow((NANO_DIGITS - fraction.len()) as u32))
}

/// A payer account plus the earliest consensus time at which the transaction may execute.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr,
)]
pub struct TransactionId {
    /// The account paying for the transaction.
    pub account_id: AccountId,
    /// The valid start timestamp.
    pub valid_start: Timestamp,
}

impl TransactionId {
    /// Create an id with an explicit valid start.
    pub fn with_valid_start(account_id: AccountId, valid_start: Timestamp) -> Self {
        Self { account_id, valid_start }
    }

    /// Generate a fresh id for `account_id` from the current time.
    pub fn generate(account_id: AccountId) -> Self {
        let backdate = rand::rng().random_range(BACKDATE_MILLIS);
        let valid_start = Timestamp::now().saturating_sub(Duration::from_millis(backdate));
        Self::with_valid_start(account_id, valid_start)
    }

    /// The id whose valid start is `nanos` later than this one.
    ///
    /// Chunk `i` of a chunked transaction uses `first.plus_nanos(i)`.
    pub fn plus_nanos(self, nanos: u64) -> Self {
        Self { valid_start: self.valid_start.plus_nanos(nanos), ..self }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

impl FromStr for TransactionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (account, start) =
            s.split_once('@').ok_or_else(|| ParseIdError::malformed("account@seconds.nanos", s))?;
        let (seconds, nanos) = start
            .split_once('.')
            .ok_or_else(|| ParseIdError::malformed("account@seconds.nanos", s))?;
        let seconds =
            seconds.parse().map_err(|_| ParseIdError::InvalidNumber(seconds.to_string()))?;
        let nanos = parse_fraction(nanos)?;
        Ok(Self::with_valid_start(account.parse()?, Timestamp::new(seconds, nanos)))
    }
}
