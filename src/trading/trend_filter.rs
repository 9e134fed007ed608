//! Entry gating and reversal exits driven by an external trend signal.

use rand::Rng;

use crate::models::Side;

/// Wraps the oracle's directional signal for one decision.
#[derive(Debug, Clone)]
pub struct TrendFilter {
    admission_probability: f64,
}

impl TrendFilter {
    pub fn new(admission_probability: f64) -> Self {
        Self {
            admission_probability: admission_probability.clamp(0.0, 1.0),
        }
    }

    /// The signal points against the held side.
    pub fn is_reversal(&self, held: Side, signal: Option<Side>) -> bool {
        signal.is_some_and(|s| s != held)
    }

    /// Entry direction for a flat instrument, `None` when there is no signal.
    pub fn entry_side(&self, signal: Option<Side>) -> Option<Side> {
        signal
    }

    /// Random admission draw spreading entries across ticks and instruments.
    pub fn admit<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        if self.admission_probability >= 1.0 {
            return true;
        }
        rng.gen::<f64>() < self.admission_probability
    }
}
