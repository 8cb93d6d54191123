//! In-process cluster runner.
//!
//! Hosts N `RaftNode` instances as concurrent Tokio tasks on one runtime,
//! wired together with `raft_transport::ChannelTransport`, so scenarios can
//! exercise the full election protocol without spawning OS processes.

use std::path::Path;

use raft_core::{FailSpec, NodeConfig, RaftNode, SeededRandomSource};
use raft_logging::{LogLevel, Logger};
use raft_transport::Cluster as ChannelCluster;
use tokio::task::JoinHandle;

use crate::fault_injection::LossyTransport;

/// One running node: its task handle and the log file it writes to.
pub struct ClusterNode {
    pub log_path: std::path::PathBuf,
    handle: JoinHandle<()>,
}

impl ClusterNode {
    /// Simulates an external crash: abort the node's task outright. Unlike
    /// the failure oracle's `Dead` interval, this never comes back.
    pub fn kill(self) {
        self.handle.abort();
    }
}

/// A running in-process cluster of election-protocol nodes.
pub struct Cluster {
    pub nodes: Vec<Option<ClusterNode>>,
}

impl Cluster {
    /// Spawns `size` nodes, each logging to `<log_dir>/node<rank>.log`.
    /// `seed` makes timeouts and failure-oracle draws reproducible across
    /// runs of the same scenario. `message_loss_rate` is applied uniformly
    /// to every outbound send via [`LossyTransport`].
    pub fn spawn(
        size: usize,
        min_timeout_ms: u64,
        max_timeout_ms: u64,
        fail_chance: f64,
        message_loss_rate: f64,
        seed: u64,
        log_dir: &Path,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let transports = ChannelCluster::build(size);

        let mut nodes = Vec::with_capacity(size);
        for (rank, transport) in transports.into_iter().enumerate() {
            let log_path = log_dir.join(format!("node{rank}.log"));
            let logger = Logger::new(&log_path, LogLevel::Debug)
                .expect("log directory was just created");

            let transport = LossyTransport::new(transport, message_loss_rate, seed ^ (rank as u64));
            let rng = SeededRandomSource::new(seed.wrapping_add(rank as u64 * 7919));
            let config = NodeConfig {
                min_timeout_ms,
                max_timeout_ms,
                fail_spec: FailSpec::Chance(fail_chance),
            };

            let handle = tokio::spawn(async move {
                let mut node = RaftNode::new(transport, rng, logger, config);
                node.run().await;
            });

            nodes.push(Some(ClusterNode { log_path, handle }));
        }

        Ok(Self { nodes })
    }

    /// Aborts one node's task, simulating a permanent crash.
    pub fn kill_node(&mut self, rank: usize) {
        if let Some(node) = self.nodes.get_mut(rank).and_then(Option::take) {
            node.kill();
        }
    }

    pub fn log_path(&self, rank: usize) -> Option<&Path> {
        self.nodes
            .get(rank)
            .and_then(Option::as_ref)
            .map(|n| n.log_path.as_path())
    }

    /// Aborts every still-running node, e.g. once a scenario has collected
    /// the evidence it needs from the logs.
    pub fn shutdown(&mut self) {
        for slot in self.nodes.iter_mut() {
            if let Some(node) = slot.take() {
                node.kill();
            }
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        self.shutdown();
    }
}
