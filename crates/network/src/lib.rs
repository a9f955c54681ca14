//! Consensus and mirror node registries for the ledger client.
//!
//! Tracks every known node, the health of each endpoint and the transport channel used to reach
//! it. Health is the only state mutated during normal operation.

mod channel;
pub mod error;
mod grpc;
mod health;
mod mirror;
mod node;
mod registry;

pub use channel::{is_transient, Connector, GrpcMethod, NodeChannel, ResponseStream};
pub use error::{NetworkError, NetworkResult};
pub use grpc::{GrpcChannel, GrpcConnector, RawCodec};
pub use health::NodeHealth;
pub use mirror::MirrorNetwork;
pub use node::{Endpoint, Node};
pub use registry::Network;
