//! Concrete `Transport` adapters for `raft-core`'s node state machine.

pub mod channel;
pub mod error;
pub mod tcp;

pub use channel::{ChannelTransport, Cluster};
pub use error::TransportError;
pub use tcp::TcpTransport;
