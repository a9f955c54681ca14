//! Network addresses for consensus and mirror endpoints.

use crate::error::ParseIdError;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr};

/// Plaintext gRPC port used by consensus nodes.
pub const PLAINTEXT_PORT: u16 = 50211;
/// TLS gRPC port used by consensus nodes.
pub const TLS_PORT: u16 = 50212;
/// TLS port used by public mirror nodes.
pub const MIRROR_TLS_PORT: u16 = 443;

/// A `host:port` endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// The host name or ip.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether connections to this address use TLS.
    pub fn is_transport_security(&self) -> bool {
        self.port == TLS_PORT || self.port == MIRROR_TLS_PORT
    }

    /// The uri used to open a transport channel.
    pub fn to_uri(&self) -> String {
        let scheme = if self.is_transport_security() { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) =
            s.rsplit_once(':').ok_or_else(|| ParseIdError::malformed("host:port", s))?;
        if host.is_empty() {
            return Err(ParseIdError::malformed("host:port", s));
        }
        let port = port.parse().map_err(|_| ParseIdError::InvalidNumber(port.to_string()))?;
        Ok(Self::new(host, port))
    }
}
