//! Entropy sources for election timeouts and the chance-based failure oracle.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform integer and unit-interval draws, abstracted so tests can inject a
/// seeded source while production nodes use real entropy.
pub trait RandomSource {
    /// Uniform integer in `[lo, hi]` inclusive.
    fn rand_int(&mut self, lo: u64, hi: u64) -> u64;
    /// Uniform float in `[0.0, 1.0)`.
    fn rand_unit(&mut self) -> f64;
}

/// Draws from the thread-local OS-seeded RNG. Distinct ranks naturally draw
/// uncorrelated timeouts since each process has its own thread-local state.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandomSource;

impl RandomSource for ThreadRandomSource {
    fn rand_int(&mut self, lo: u64, hi: u64) -> u64 {
        rand::thread_rng().gen_range(lo..=hi)
    }

    fn rand_unit(&mut self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
    }
}

/// Deterministic RNG for reproducible scenario tests.
pub struct SeededRandomSource {
    rng: StdRng,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn rand_int(&mut self, lo: u64, hi: u64) -> u64 {
        self.rng.gen_range(lo..=hi)
    }

    fn rand_unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}
