//! Leader-election subset of Raft.
//!
//! A node is one cooperative, single-threaded state machine
//! (`Follower -> Candidate -> Leader`) driven by [`node::RaftNode::run`].
//! Everything external — the message bus, the failure oracle's entropy, and
//! log output — is injected so the state machine itself stays free of I/O.

pub mod clock;
pub mod failure;
pub mod node;
pub mod quorum;
pub mod random;
pub mod transport;
pub mod types;

pub use failure::FailureOracle;
pub use node::{NodeConfig, RaftNode};
pub use quorum::majority;
pub use random::{RandomSource, SeededRandomSource, ThreadRandomSource};
pub use transport::Transport;
pub use types::{FailSpec, MessageTag, Role, WireMessage};
