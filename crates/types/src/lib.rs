//! Core value types shared by the ledger client crates.
//!
//! Identifiers, timestamps, precheck status codes and the message shapes that cross the
//! boundary between the protocol engine and the request builders.

mod address;
mod id;
mod response;
mod signer;
mod status;
mod timestamp;
mod topic;
mod transaction_id;
#[macro_use]
pub mod error;
pub use address::*;
pub use id::*;
pub use response::*;
pub use signer::*;
pub use status::*;
pub use timestamp::*;
pub use topic::*;
pub use transaction_id::*;
