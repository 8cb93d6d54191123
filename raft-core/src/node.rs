//! Role state machine and driver loop.
//!
//! Each role subroutine cooperatively polls the transport and yields by
//! sleeping `POLL_INTERVAL_MS` between polls; this is intentional (see the
//! module docs on the crate root) and is not replaced with event-driven
//! primitives.

use std::time::{Duration, Instant};

use raft_logging::{LogLevel, Logger};
use tokio::time::sleep;

use crate::clock::{BROADCAST_INTERVAL_MS, DEAD_TIME_MS, POLL_INTERVAL_MS};
use crate::failure::FailureOracle;
use crate::quorum::majority;
use crate::random::RandomSource;
use crate::transport::Transport;
use crate::types::{FailSpec, MessageTag, Role};

/// Per-node configuration fixed at construction time.
pub struct NodeConfig {
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub fail_spec: FailSpec,
}

/// A single cluster participant running the leader-election state machine.
///
/// Generic over `Transport` and `RandomSource` so tests can substitute an
/// in-memory transport and a seeded RNG without touching this module.
pub struct RaftNode<T: Transport, R: RandomSource> {
    transport: T,
    rng: R,
    logger: Logger,
    fail_oracle: FailureOracle,
    config: NodeConfig,
    role: Role,
    term: u64,
    voted_for: Option<usize>,
}

impl<T: Transport, R: RandomSource> RaftNode<T, R> {
    pub fn new(transport: T, rng: R, logger: Logger, config: NodeConfig) -> Self {
        let start = Instant::now();
        let fail_oracle = FailureOracle::new(config.fail_spec, start);
        let mut node = Self {
            transport,
            rng,
            logger,
            fail_oracle,
            config,
            role: Role::Follower,
            term: 0,
            voted_for: None,
        };
        node.log(LogLevel::Info, "initialized node");
        node
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    /// Run the driver loop forever. There is no terminal state.
    pub async fn run(&mut self) -> ! {
        loop {
            match self.role {
                Role::Follower => {
                    self.log(LogLevel::Info, &format!("state changed to follower at term {}", self.term));
                    self.run_follower().await;
                }
                Role::Candidate => {
                    self.log(LogLevel::Info, &format!("state changed to candidate at term {}", self.term));
                    self.run_candidate().await;
                }
                Role::Leader => {
                    self.log(LogLevel::Info, &format!("state changed to leader at term {}", self.term));
                    self.run_leader().await;
                }
            }
        }
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        let _ = self.logger.log(level, message);
    }

    /// Universal pre-dispatch rule (§4.F): adopt a strictly higher term and
    /// clear the vote before any role-specific handling. Returns whether the
    /// term was in fact raised.
    fn adopt_term_if_higher(&mut self, observed_term: u64) -> bool {
        if observed_term > self.term {
            self.term = observed_term;
            self.voted_for = None;
            true
        } else {
            false
        }
    }

    async fn run_follower(&mut self) {
        let mut last_heartbeat = Instant::now();
        let timeout = self.rng.rand_int(self.config.min_timeout_ms, self.config.max_timeout_ms);

        loop {
            if let Some((src, tag, t)) = self.transport.try_recv() {
                self.adopt_term_if_higher(t);
                match tag {
                    MessageTag::Heartbeat => {
                        if t >= self.term {
                            last_heartbeat = Instant::now();
                            self.log(LogLevel::Debug, "received valid heartbeat as follower");
                        } else {
                            self.log(LogLevel::Debug, "received stale heartbeat as follower");
                        }
                    }
                    MessageTag::VoteRequest => {
                        if t < self.term {
                            self.log(LogLevel::Debug, "refused stale vote request as follower");
                        } else if self.voted_for.is_none() || self.voted_for == Some(src) {
                            self.transport.send(src, MessageTag::VoteResponse, self.term);
                            self.voted_for = Some(src);
                            self.log(LogLevel::Info, "granted vote request as follower");
                        } else {
                            self.log(LogLevel::Debug, "refused vote request, already voted as follower");
                        }
                    }
                    MessageTag::VoteResponse => {
                        self.log(LogLevel::Debug, "ignored vote response as follower");
                    }
                }
            }

            if last_heartbeat.elapsed().as_millis() as u64 > timeout {
                self.log(LogLevel::Warning, "heartbeat timed out as follower");
                self.role = Role::Candidate;
                return;
            }

            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn run_candidate(&mut self) {
        self.term += 1;
        self.voted_for = Some(self.transport.rank());

        let size = self.transport.size();
        let mut votes = vec![false; size];
        votes[self.transport.rank()] = true;

        if majority(&votes) {
            // N = 1: the self-vote alone is already a strict majority.
            self.role = Role::Leader;
            self.log(LogLevel::Info, "won election as candidate");
            return;
        }

        let election_time = self.rng.rand_int(self.config.min_timeout_ms, self.config.max_timeout_ms);
        let election_start = Instant::now();
        let mut last_broadcast = election_start - Duration::from_millis(BROADCAST_INTERVAL_MS + 1);

        loop {
            if election_start.elapsed().as_millis() as u64 >= election_time {
                // Split vote: remain Candidate, driver restarts the election
                // with a fresh term and a fresh random timeout.
                return;
            }

            if last_broadcast.elapsed().as_millis() as u64 >= BROADCAST_INTERVAL_MS {
                self.transport.broadcast(MessageTag::VoteRequest, self.term);
                last_broadcast = Instant::now();
            }

            if let Some((src, tag, t)) = self.transport.try_recv() {
                if self.adopt_term_if_higher(t) {
                    self.role = Role::Follower;
                    self.log(LogLevel::Info, "stepped down from candidate: observed higher term");
                    return;
                }

                match tag {
                    MessageTag::Heartbeat => {
                        if t >= self.term {
                            self.term = t;
                            self.voted_for = None;
                            self.role = Role::Follower;
                            self.log(LogLevel::Info, "stepped down from candidate: leader established");
                            return;
                        }
                    }
                    MessageTag::VoteResponse => {
                        if t == self.term {
                            if let Some(slot) = votes.get_mut(src) {
                                *slot = true;
                            }
                            self.log(LogLevel::Debug, "received vote as candidate");
                            if majority(&votes) {
                                self.role = Role::Leader;
                                self.log(LogLevel::Info, "won election as candidate");
                                return;
                            }
                        }
                    }
                    MessageTag::VoteRequest => {
                        self.log(LogLevel::Debug, "ignored vote request as candidate");
                    }
                }
            }

            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    async fn run_leader(&mut self) {
        let mut last_broadcast = Instant::now() - Duration::from_millis(BROADCAST_INTERVAL_MS + 1);

        loop {
            if last_broadcast.elapsed().as_millis() as u64 >= BROADCAST_INTERVAL_MS {
                self.log(LogLevel::Debug, "broadcasting heartbeat");
                self.transport.broadcast(MessageTag::Heartbeat, self.term);
                last_broadcast = Instant::now();
            }

            if let Some((src, tag, t)) = self.transport.try_recv() {
                // Unlike Candidate, Leader does not step down on every
                // higher-term message as a blanket rule: Heartbeat and
                // VoteRequest each decide for themselves per §4.F. Only
                // VoteResponse (which the per-tag pseudocode otherwise just
                // calls stale) falls back to the higher-term step-down, per
                // P5 (see the design notes on this resolution).
                let stepped = self.adopt_term_if_higher(t);

                match tag {
                    MessageTag::Heartbeat => {
                        if stepped {
                            self.role = Role::Follower;
                            self.log(LogLevel::Warning, "stepped down from leader: observed higher term");
                            return;
                        } else if t == self.term {
                            self.log(LogLevel::Warning, "received heartbeat from peer with equal term");
                        }
                        // t < self.term: stale leader, ignore.
                    }
                    MessageTag::VoteRequest => {
                        if t >= self.term && (self.voted_for.is_none() || self.voted_for == Some(src)) {
                            self.term = t;
                            self.voted_for = Some(src);
                            self.transport.send(src, MessageTag::VoteResponse, self.term);
                            self.role = Role::Follower;
                            self.log(LogLevel::Info, "stepped down from leader: granted vote");
                            return;
                        } else {
                            self.log(LogLevel::Debug, "ignored vote request as leader");
                        }
                    }
                    MessageTag::VoteResponse => {
                        if stepped {
                            self.role = Role::Follower;
                            self.log(LogLevel::Info, "stepped down from leader: observed higher term via vote response");
                            return;
                        }
                        self.log(LogLevel::Debug, "ignored stale vote response as leader");
                    }
                }
            }

            if self.fail_oracle.check(&mut self.rng) {
                self.log(LogLevel::Warning, "node is dead");
                sleep(Duration::from_millis(DEAD_TIME_MS)).await;
                self.log(LogLevel::Info, "node is back online");
            }

            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandomSource;
    use crate::transport::test_support::FakeTransport;

    fn logger() -> Logger {
        let dir = tempfile::tempdir().unwrap();
        Logger::new(dir.path().join("node.log"), LogLevel::Debug).unwrap()
    }

    fn config(min: u64, max: u64) -> NodeConfig {
        NodeConfig {
            min_timeout_ms: min,
            max_timeout_ms: max,
            fail_spec: FailSpec::Chance(0.0),
        }
    }

    #[tokio::test]
    async fn single_node_cluster_elects_itself() {
        let transport = FakeTransport::new(0, 1);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(5, 10));

        node.run_candidate().await;

        assert_eq!(node.role(), Role::Leader);
        assert_eq!(node.term(), 1);
    }

    #[tokio::test]
    async fn candidate_becomes_leader_on_majority() {
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::VoteResponse, 1);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(5, 10));

        node.run_candidate().await;

        // One self-vote plus one peer vote is a majority of 3.
        assert_eq!(node.role(), Role::Leader);
    }

    #[tokio::test]
    async fn candidate_steps_down_on_heartbeat_from_new_leader() {
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::Heartbeat, 1);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(50, 60));

        node.run_candidate().await;

        assert_eq!(node.role(), Role::Follower);
        assert_eq!(node.term(), 1);
    }

    #[tokio::test]
    async fn candidate_steps_down_on_higher_term_vote_response() {
        // P5: a VoteResponse carrying a higher term forces step-down even
        // though the per-tag pseudocode only calls this out for Heartbeat.
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::VoteResponse, 99);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(50, 60));

        node.run_candidate().await;

        assert_eq!(node.role(), Role::Follower);
        assert_eq!(node.term(), 99);
    }

    #[tokio::test]
    async fn candidate_without_majority_remains_candidate_on_timeout() {
        let transport = FakeTransport::new(0, 5);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(5, 10));

        node.run_candidate().await;

        assert_eq!(node.role(), Role::Candidate);
    }

    #[tokio::test]
    async fn follower_times_out_into_candidate() {
        let transport = FakeTransport::new(0, 3);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(5, 8));

        node.run_follower().await;

        assert_eq!(node.role(), Role::Candidate);
    }

    #[tokio::test]
    async fn follower_ignores_stale_heartbeat() {
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::Heartbeat, 0);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(40, 60));
        node.term = 7;

        node.run_follower().await;

        assert_eq!(node.term(), 7);
        assert_eq!(node.role(), Role::Candidate);
    }

    #[tokio::test]
    async fn follower_votes_once_per_term() {
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::VoteRequest, 1);
        transport.push_inbound(2, MessageTag::VoteRequest, 1);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(40, 60));

        node.run_follower().await;

        let sent = node.transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
    }

    #[tokio::test]
    async fn leader_steps_down_when_granting_vote() {
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::VoteRequest, 5);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(40, 60));
        node.role = Role::Leader;
        node.term = 3;

        node.run_leader().await;

        assert_eq!(node.role(), Role::Follower);
        assert_eq!(node.term(), 5);
        let sent = node.transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, MessageTag::VoteResponse);
    }

    #[tokio::test]
    async fn leader_ignores_stale_vote_response() {
        let mut transport = FakeTransport::new(0, 3);
        transport.push_inbound(1, MessageTag::VoteResponse, 1);
        let mut node = RaftNode::new(transport, SeededRandomSource::new(1), logger(), config(40, 60));
        node.role = Role::Leader;
        node.term = 3;

        // One tick's worth of the leader loop: run_leader only returns on
        // step-down, so we drive it manually via a short deadline by
        // stepping down through a subsequent higher-term heartbeat.
        node.transport.push_inbound(2, MessageTag::Heartbeat, 9);
        node.run_leader().await;

        assert_eq!(node.role(), Role::Follower);
        assert_eq!(node.term(), 9);
    }
}
