//! Delay between polling ticks.

use std::time::Duration;

use rand::Rng;

use super::PacingConfig;

/// Base delay plus a bounded random jitter, so polling has no fixed cadence.
#[derive(Debug, Clone)]
pub struct Pacer {
    base: Duration,
    max_jitter: Duration,
}

impl Pacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            base: Duration::from_secs(config.base_sleep_secs),
            max_jitter: Duration::from_secs(config.max_jitter_secs),
        }
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_jitter.is_zero() {
            return self.base;
        }
        let jitter = rng.gen_range(0.0..self.max_jitter.as_secs_f64());
        self.base + Duration::from_secs_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_delay_bounds() {
        let pacer = Pacer::new(&PacingConfig::default());
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let d = pacer.next_delay(&mut rng);
            assert!(d >= Duration::from_secs(30));
            assert!(d < Duration::from_secs(150));
        }
    }

    #[test]
    fn test_seeded_delays_repeat() {
        let pacer = Pacer::new(&PacingConfig::default());
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(pacer.next_delay(&mut a), pacer.next_delay(&mut b));
    }

    #[test]
    fn test_no_jitter() {
        let pacer = Pacer::new(&PacingConfig {
            base_sleep_secs: 5,
            max_jitter_secs: 0,
        });
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pacer.next_delay(&mut rng), Duration::from_secs(5));
    }
}
