//! Transport abstraction consumed by the role state machine.
//!
//! Deliberately synchronous and non-blocking: `barrier()` is the only
//! cluster-rendezvous operation, and it is used once at startup by the
//! process driving a node, not by the role subroutines themselves, so it is
//! not part of this trait. Concrete adapters (`raft-transport`) expose
//! `barrier` as an inherent async method instead.

use crate::types::MessageTag;

/// Thin facade over a best-effort, tagged, peer-to-peer message bus.
///
/// Implementations must preserve FIFO order per `(src, dst)` link and must
/// never block the caller on `send`/`try_recv`.
pub trait Transport {
    /// This process's rank in `[0, size())`.
    fn rank(&self) -> usize;

    /// Total number of nodes in the cluster.
    fn size(&self) -> usize;

    /// Fire-and-forget send; delivery is best-effort and never blocks.
    fn send(&self, dest: usize, tag: MessageTag, term: u64);

    /// Returns the next pending message, if any, without blocking.
    fn try_recv(&mut self) -> Option<(usize, MessageTag, u64)>;

    /// `send` to every other rank in the cluster.
    fn broadcast(&self, tag: MessageTag, term: u64) {
        for dest in 0..self.size() {
            if dest != self.rank() {
                self.send(dest, tag, term);
            }
        }
    }
}
