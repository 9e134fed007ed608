//! Smoothed volatility and the dynamic stop-loss threshold it drives.

use std::collections::VecDeque;

use statrs::statistics::Statistics;

use crate::trading::ExitConfig;

/// Bounded buffer of raw volatility samples, oldest evicted first.
#[derive(Debug, Clone)]
pub struct VolatilityEstimator {
    samples: VecDeque<f64>,
    capacity: usize,
    noise_floor: f64,
    max_loss_percent: f64,
    max_leverage_scale: f64,
}

impl VolatilityEstimator {
    pub fn new(config: &ExitConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.volatility_capacity),
            capacity: config.volatility_capacity.max(1),
            noise_floor: config.volatility_noise_floor,
            max_loss_percent: config.max_loss_percent,
            max_leverage_scale: config.max_leverage_scale,
        }
    }

    /// Add a raw sample, dropping the oldest past capacity.
    pub fn push(&mut self, sample: f64) {
        if !sample.is_finite() {
            return;
        }
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the buffer, or `raw` when the buffer is empty.
    pub fn smoothed(&self, raw: f64) -> f64 {
        if self.samples.is_empty() {
            return raw;
        }
        self.samples.iter().mean()
    }

    /// Mean of the buffer, `None` when no sample has been seen.
    pub fn current(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().mean())
        }
    }

    /// `max_loss * min(lev/10, cap) / max(1, smoothed/floor)`.
    ///
    /// High leverage tightens the stop (up to the cap); high volatility
    /// divides it down toward zero.
    pub fn stop_loss_threshold(&self, leverage: u32, smoothed: f64) -> f64 {
        let leverage_scale = (leverage as f64 / 10.0).min(self.max_leverage_scale);
        let vol_scale = if self.noise_floor > 0.0 {
            (smoothed / self.noise_floor).max(1.0)
        } else {
            1.0
        };
        self.max_loss_percent * leverage_scale / vol_scale
    }

    /// Volatility is high enough for a stop-loss to be trusted.
    pub fn above_noise_floor(&self, smoothed: f64) -> bool {
        smoothed > self.noise_floor
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }
}
