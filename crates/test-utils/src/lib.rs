//! Test fixtures for the ledger client crates.
//!
//! Scripted transports so dispatch and subscription logic can be exercised without sockets.

#![warn(unused_crate_dependencies)]

mod fixtures;
pub use fixtures::*;
mod mock;
pub use mock::*;
mod tracing;
pub use crate::tracing::*;
