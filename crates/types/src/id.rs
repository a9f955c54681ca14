//! Entity identifiers in `shard.realm.num` form.
//!
//! Checksums and alias forms are the concern of the request builders. The engine only needs to
//! compare, hash and print ids.

use crate::error::ParseIdError;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            SerializeDisplay, DeserializeFromStr,
        )]
        pub struct $name {
            /// The shard number.
            pub shard: u64,
            /// The realm number.
            pub realm: u64,
            /// The entity number within the realm.
            pub num: u64,
        }

        impl $name {
            /// Create a new id from its components.
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self { shard, realm, num }
            }

            /// Shorthand for `0.0.num`.
            pub const fn from_num(num: u64) -> Self {
                Self::new(0, 0, num)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let (shard, realm, num) = parse_entity_parts(s)?;
                Ok(Self::new(shard, realm, num))
            }
        }
    };
}

entity_id!(
    /// An account on the ledger. Consensus nodes are addressed by the account that owns them.
    AccountId
);

entity_id!(
    /// A consensus topic.
    TopicId
);

/// Split `shard.realm.num`. A trailing `-checksum` is ignored.
fn parse_entity_parts(s: &str) -> Result<(u64, u64, u64), ParseIdError> {
    let id = s.split_once('-').map_or(s, |(id, _checksum)| id);
    let mut parts = id.split('.');
    let (Some(shard), Some(realm), Some(num), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseIdError::malformed("shard.realm.num", s));
    };

    let parse = |part: &str| {
        part.parse::<u64>().map_err(|_| ParseIdError::InvalidNumber(part.to_string()))
    };
    Ok((parse(shard)?, parse(realm)?, parse(num)?))
}
