//! Core wire and role types for leader election.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Role in the election state machine. `Dead` is deliberately not a variant
/// here — simulated failure is handled by the failure oracle pausing the
/// Leader subroutine in place, not by a role transition (see
/// [`crate::failure`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl Default for Role {
    fn default() -> Self {
        Role::Follower
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Follower => "follower",
            Role::Candidate => "candidate",
            Role::Leader => "leader",
        };
        f.write_str(s)
    }
}

/// Tag distinguishing a message without carrying its payload, used by the
/// role subroutines for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    Heartbeat,
    VoteRequest,
    VoteResponse,
}

/// The wire-level envelope a concrete transport actually serializes. Payload
/// is always a single term, per the spec's message model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { term: u64 },
    #[serde(rename = "VOTE_REQUEST")]
    VoteRequest { term: u64 },
    #[serde(rename = "VOTE_RESPONSE")]
    VoteResponse { term: u64 },
}

impl WireMessage {
    pub fn new(tag: MessageTag, term: u64) -> Self {
        match tag {
            MessageTag::Heartbeat => WireMessage::Heartbeat { term },
            MessageTag::VoteRequest => WireMessage::VoteRequest { term },
            MessageTag::VoteResponse => WireMessage::VoteResponse { term },
        }
    }

    pub fn tag(&self) -> MessageTag {
        match self {
            WireMessage::Heartbeat { .. } => MessageTag::Heartbeat,
            WireMessage::VoteRequest { .. } => MessageTag::VoteRequest,
            WireMessage::VoteResponse { .. } => MessageTag::VoteResponse,
        }
    }

    pub fn term(&self) -> u64 {
        match self {
            WireMessage::Heartbeat { term }
            | WireMessage::VoteRequest { term }
            | WireMessage::VoteResponse { term } => *term,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// The two failure-oracle modes described by the simulation's configuration.
#[derive(Debug, Clone, Copy)]
pub enum FailSpec {
    /// Per-second failure rate; evaluated every poll tick.
    Chance(f64),
    /// Trigger once this much wall-clock time has elapsed since node start.
    Time(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_round_trips() {
        let msg = WireMessage::new(MessageTag::VoteRequest, 7);
        let bytes = msg.to_bytes().unwrap();
        let parsed = WireMessage::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.term(), 7);
        assert_eq!(parsed.tag(), MessageTag::VoteRequest);
    }

    #[test]
    fn role_defaults_to_follower() {
        assert_eq!(Role::default(), Role::Follower);
    }
}
