//! `Transport` over real TCP sockets, one process per rank.
//!
//! One physical connection per unordered pair of ranks, opened by the
//! lower-ranked peer and used bidirectionally afterwards — a single TCP
//! stream already gives FIFO delivery independently in each direction, which
//! is all the protocol needs per `(src, dst)` link.

use std::net::SocketAddr;

use raft_core::types::{MessageTag, WireMessage};
use raft_core::Transport;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

use crate::error::TransportError;

/// Everything carried over a connection besides the protocol payload itself:
/// the initiator announces its rank, and `barrier()` piggybacks on the same
/// framing rather than opening a side channel.
#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Handshake { rank: usize },
    Ready,
    Msg(WireMessage),
}

pub struct TcpTransport {
    rank: usize,
    size: usize,
    outbound: Vec<Option<mpsc::UnboundedSender<Frame>>>,
    inbox: mpsc::UnboundedReceiver<(usize, WireMessage)>,
    ready_acks: Mutex<mpsc::UnboundedReceiver<()>>,
}

impl TcpTransport {
    /// Establishes the full mesh of connections for a cluster of
    /// `peers.len()` nodes, where `peers[i]` is rank `i`'s listen address.
    /// Returns once every expected connection (inbound and outbound) for
    /// this rank exists.
    pub async fn bind(rank: usize, peers: Vec<SocketAddr>) -> Result<Self, TransportError> {
        let size = peers.len();
        if rank >= size {
            return Err(TransportError::RankOutOfRange { rank, size });
        }

        let listener = TcpListener::bind(peers[rank])
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: peers[rank].to_string(),
                source,
            })?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel::<(usize, WireMessage)>();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel::<()>();
        let (reg_tx, mut reg_rx) =
            mpsc::unbounded_channel::<(usize, mpsc::UnboundedSender<Frame>)>();

        let expected_inbound = rank;
        let accept_inbox = inbox_tx.clone();
        let accept_ready = ready_tx.clone();
        let accept_reg = reg_tx.clone();
        let accept_task = tokio::spawn(async move {
            for _ in 0..expected_inbound {
                if let Ok((stream, _)) = listener.accept().await {
                    spawn_connection(
                        stream,
                        None,
                        accept_inbox.clone(),
                        accept_ready.clone(),
                        Some(accept_reg.clone()),
                    );
                }
            }
        });

        let mut outbound = vec![None; size];
        for dest in (rank + 1)..size {
            let stream =
                TcpStream::connect(peers[dest])
                    .await
                    .map_err(|source| TransportError::ConnectFailed {
                        addr: peers[dest].to_string(),
                        source,
                    })?;
            let sender = spawn_connection(
                stream,
                Some(rank),
                inbox_tx.clone(),
                ready_tx.clone(),
                None,
            );
            outbound[dest] = sender;
        }

        let _ = accept_task.await;
        drop(reg_tx);
        drop(inbox_tx);
        drop(ready_tx);

        while let Some((peer_rank, sender)) = reg_rx.recv().await {
            outbound[peer_rank] = Some(sender);
        }

        Ok(Self {
            rank,
            size,
            outbound,
            inbox: inbox_rx,
            ready_acks: Mutex::new(ready_rx),
        })
    }

    /// Cluster-wide rendezvous, used once at startup. Not part of the
    /// `Transport` trait: the role state machine never calls it itself.
    pub async fn barrier(&self) {
        for (dest, sender) in self.outbound.iter().enumerate() {
            if dest != self.rank {
                if let Some(sender) = sender {
                    let _ = sender.send(Frame::Ready);
                }
            }
        }

        let mut acks = self.ready_acks.lock().await;
        for _ in 0..(self.size - 1) {
            if acks.recv().await.is_none() {
                break;
            }
        }
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: MessageTag, term: u64) {
        if let Some(Some(sender)) = self.outbound.get(dest) {
            let _ = sender.send(Frame::Msg(WireMessage::new(tag, term)));
        }
    }

    fn try_recv(&mut self) -> Option<(usize, MessageTag, u64)> {
        match self.inbox.try_recv() {
            Ok((src, msg)) => Some((src, msg.tag(), msg.term())),
            Err(_) => None,
        }
    }
}

/// Spawns the reader/writer task pair for one connection and returns the
/// writer handle when the peer's rank is already known (we initiated the
/// connection); for accepted connections the rank arrives via handshake and
/// is reported back through `reg_tx` instead.
fn spawn_connection(
    stream: TcpStream,
    known_peer_rank: Option<usize>,
    inbox_tx: mpsc::UnboundedSender<(usize, WireMessage)>,
    ready_tx: mpsc::UnboundedSender<()>,
    reg_tx: Option<mpsc::UnboundedSender<(usize, mpsc::UnboundedSender<Frame>)>>,
) -> Option<mpsc::UnboundedSender<Frame>> {
    let (read_half, write_half) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();

    tokio::spawn(async move {
        let mut writer = BufWriter::new(write_half);
        while let Some(frame) = out_rx.recv().await {
            let Ok(mut line) = serde_json::to_vec(&frame) else {
                continue;
            };
            line.push(b'\n');
            if writer.write_all(&line).await.is_err() {
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
    });

    if let Some(self_rank) = known_peer_rank {
        let _ = out_tx.send(Frame::Handshake { rank: self_rank });
    }

    let reader_out_tx = out_tx.clone();
    tokio::spawn(async move {
        let mut peer_rank = known_peer_rank;
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match serde_json::from_str::<Frame>(&line) {
                Ok(Frame::Handshake { rank }) => {
                    peer_rank = Some(rank);
                    if let Some(reg) = &reg_tx {
                        let _ = reg.send((rank, reader_out_tx.clone()));
                    }
                }
                Ok(Frame::Ready) => {
                    let _ = ready_tx.send(());
                }
                Ok(Frame::Msg(msg)) => {
                    if let Some(src) = peer_rank {
                        let _ = inbox_tx.send((src, msg));
                    }
                }
                Err(_) => {}
            }
        }
    });

    known_peer_rank.map(|_| out_tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn local_addrs(n: usize) -> Vec<SocketAddr> {
        let mut addrs = Vec::with_capacity(n);
        for _ in 0..n {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            addrs.push(listener.local_addr().unwrap());
            drop(listener);
        }
        addrs
    }

    #[tokio::test]
    async fn three_node_mesh_connects_and_exchanges_messages() {
        let peers = local_addrs(3).await;

        let p0 = peers.clone();
        let p1 = peers.clone();
        let p2 = peers.clone();

        let (t0, t1, t2) = tokio::join!(
            TcpTransport::bind(0, p0),
            TcpTransport::bind(1, p1),
            TcpTransport::bind(2, p2),
        );
        let t0 = t0.unwrap();
        let mut t1 = t1.unwrap();
        let mut t2 = t2.unwrap();

        tokio::join!(t0.barrier(), t1.barrier(), t2.barrier());

        t0.send(1, MessageTag::Heartbeat, 3);

        let mut received = None;
        for _ in 0..200 {
            if let Some(msg) = t1.try_recv() {
                received = Some(msg);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(received, Some((0, MessageTag::Heartbeat, 3)));
        assert!(t2.try_recv().is_none());
    }
}
