//! Fault injection for cluster scenarios.
//!
//! Two faults have a real counterpart in a leader-election-only protocol:
//! message loss (a `Transport` wrapper that drops sends probabilistically)
//! and node crashes (handled by `Cluster::kill_node`, since "Byzantine"
//! behaviors like equivocation or false commits presuppose a log/commit
//! layer this protocol doesn't have).

use std::cell::RefCell;

use raft_core::types::MessageTag;
use raft_core::Transport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Wraps a `Transport`, dropping a uniformly random fraction of outbound
/// sends. Inbound delivery and `try_recv` are untouched — loss is modeled
/// at the sender, matching how an unreliable link actually behaves.
pub struct LossyTransport<T: Transport> {
    inner: T,
    loss_rate: f64,
    rng: RefCell<StdRng>,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, loss_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            loss_rate: loss_rate.clamp(0.0, 1.0),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl<T: Transport> Transport for LossyTransport<T> {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn send(&self, dest: usize, tag: MessageTag, term: u64) {
        if self.loss_rate > 0.0 && self.rng.borrow_mut().gen::<f64>() < self.loss_rate {
            return;
        }
        self.inner.send(dest, tag, term);
    }

    fn try_recv(&mut self) -> Option<(usize, MessageTag, u64)> {
        self.inner.try_recv()
    }
}

/// Predefined fault profiles for named scenarios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultProfile {
    pub message_loss_rate: f64,
    /// Rank to kill partway through the run, if any.
    pub kill_node: Option<usize>,
    /// Milliseconds into the run at which to kill it.
    pub kill_after_ms: u64,
}

impl FaultProfile {
    pub const fn none() -> Self {
        Self {
            message_loss_rate: 0.0,
            kill_node: None,
            kill_after_ms: 0,
        }
    }

    pub const fn message_loss(rate: f64) -> Self {
        Self {
            message_loss_rate: rate,
            kill_node: None,
            kill_after_ms: 0,
        }
    }

    pub const fn leader_crash(after_ms: u64) -> Self {
        Self {
            message_loss_rate: 0.0,
            kill_node: Some(0),
            kill_after_ms: after_ms,
        }
    }
}
