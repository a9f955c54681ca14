//! Crate for configuring a ledger client.
//!
//! Client-wide settings with built-in defaults, plus the per-call overrides that take precedence
//! over them.
mod chunk;
pub use chunk::*;
mod client;
pub use client::*;
mod error;
pub use error::*;
mod execution;
pub use execution::*;
mod network;
pub use network::*;
mod subscription;
pub use subscription::*;
