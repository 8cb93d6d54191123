//! Simulated node-failure oracle, consulted only from inside the Leader loop.

use std::time::{Duration, Instant};

use crate::clock::POLL_INTERVAL_MS;
use crate::random::RandomSource;
use crate::types::FailSpec;

/// Evaluates `FailSpec` against elapsed time since the node started.
pub struct FailureOracle {
    spec: FailSpec,
    start: Instant,
}

impl FailureOracle {
    pub fn new(spec: FailSpec, start: Instant) -> Self {
        Self { spec, start }
    }

    /// Returns whether the node should simulate dying on this tick.
    pub fn check(&self, rng: &mut impl RandomSource) -> bool {
        match self.spec {
            FailSpec::Chance(per_second) => {
                let per_tick = per_second * (POLL_INTERVAL_MS as f64) / 1000.0;
                rng.rand_unit() < per_tick
            }
            FailSpec::Time(threshold) => self.start.elapsed() >= threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandomSource;

    struct FixedUnit(f64);
    impl RandomSource for FixedUnit {
        fn rand_int(&mut self, lo: u64, _hi: u64) -> u64 {
            lo
        }
        fn rand_unit(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn chance_zero_never_triggers() {
        let oracle = FailureOracle::new(FailSpec::Chance(0.0), Instant::now());
        let mut rng = SeededRandomSource::new(7);
        for _ in 0..1000 {
            assert!(!oracle.check(&mut rng));
        }
    }

    #[test]
    fn chance_triggers_when_draw_below_threshold() {
        let oracle = FailureOracle::new(FailSpec::Chance(100.0), Instant::now());
        let mut rng = FixedUnit(0.0);
        assert!(oracle.check(&mut rng));
    }

    #[test]
    fn chance_does_not_trigger_when_draw_above_threshold() {
        let oracle = FailureOracle::new(FailSpec::Chance(0.001), Instant::now());
        let mut rng = FixedUnit(0.999);
        assert!(!oracle.check(&mut rng));
    }

    #[test]
    fn time_mode_triggers_once_elapsed() {
        let start = Instant::now() - Duration::from_secs(10);
        let oracle = FailureOracle::new(FailSpec::Time(Duration::from_secs(5)), start);
        let mut rng = SeededRandomSource::new(1);
        assert!(oracle.check(&mut rng));
    }

    #[test]
    fn time_mode_does_not_trigger_before_elapsed() {
        let oracle = FailureOracle::new(FailSpec::Time(Duration::from_secs(5)), Instant::now());
        let mut rng = SeededRandomSource::new(1);
        assert!(!oracle.check(&mut rng));
    }
}
