//! In-process `Transport` over Tokio unbounded channels.
//!
//! One ordered pair of ranks gets one channel, mirroring a dedicated
//! peer-to-peer link. Used by `raft-sim` to host several nodes as tasks in a
//! single process, and by `raft-core`'s own tests.

use std::sync::Arc;

use raft_core::types::{MessageTag, WireMessage};
use raft_core::Transport;
use tokio::sync::{mpsc, Barrier};

/// An in-process `Transport` endpoint for one rank of a [`Cluster`].
pub struct ChannelTransport {
    rank: usize,
    size: usize,
    senders: Vec<Option<mpsc::UnboundedSender<(usize, WireMessage)>>>,
    inbox: mpsc::UnboundedReceiver<(usize, WireMessage)>,
    barrier: Arc<Barrier>,
}

impl ChannelTransport {
    /// Cluster-wide rendezvous, used once at startup. Not part of the
    /// `Transport` trait: the role state machine never calls it itself.
    pub async fn barrier(&self) {
        self.barrier.wait().await;
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: MessageTag, term: u64) {
        if let Some(Some(sender)) = self.senders.get(dest) {
            // Fire-and-forget: a dropped receiver means a crashed or
            // partitioned peer, which the protocol is designed to tolerate.
            let _ = sender.send((self.rank, WireMessage::new(tag, term)));
        }
    }

    fn try_recv(&mut self) -> Option<(usize, MessageTag, u64)> {
        match self.inbox.try_recv() {
            Ok((src, msg)) => Some((src, msg.tag(), msg.term())),
            Err(_) => None,
        }
    }
}

/// Wires up a full mesh of `ChannelTransport` endpoints, one per rank.
pub struct Cluster;

impl Cluster {
    /// Build `size` transports, each connected to every other by its own
    /// unbounded channel, sharing one startup barrier.
    pub fn build(size: usize) -> Vec<ChannelTransport> {
        let mut senders: Vec<Vec<Option<mpsc::UnboundedSender<(usize, WireMessage)>>>> =
            (0..size).map(|_| vec![None; size]).collect();
        let mut inboxes = Vec::with_capacity(size);

        for dest in 0..size {
            let (tx, rx) = mpsc::unbounded_channel();
            inboxes.push(Some(rx));
            for src in 0..size {
                if src != dest {
                    senders[src][dest] = Some(tx.clone());
                }
            }
        }

        let barrier = Arc::new(Barrier::new(size));

        (0..size)
            .map(|rank| ChannelTransport {
                rank,
                size,
                senders: std::mem::take(&mut senders[rank]),
                inbox: inboxes[rank].take().expect("each inbox is taken exactly once"),
                barrier: barrier.clone(),
            })
            .collect()
    }
}
