//! Fixed timing constants shared by every role subroutine.
//!
//! All suspension points in the driver loop are multiples of
//! [`POLL_INTERVAL_MS`]; see the concurrency model this crate implements.

/// Sleep between non-blocking transport polls inside any role's busy loop.
pub const POLL_INTERVAL_MS: u64 = 10;

/// Period of Leader heartbeats and Candidate vote-request re-broadcasts.
pub const BROADCAST_INTERVAL_MS: u64 = 1000;

/// Duration a node simulating failure suspends all protocol activity for.
pub const DEAD_TIME_MS: u64 = 60_000;
