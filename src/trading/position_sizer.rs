//! Entry sizing: fixed quote investment rounded down to the venue lot step.

use rust_decimal::Decimal;

use super::EntryConfig;

/// Outcome of sizing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    /// Size in base units and its notional value
    Size { size: Decimal, notional: Decimal },
    /// Rounded notional is below the venue minimum
    BelowMinimum { notional: Decimal },
}

/// Calculator for entry sizes.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: EntryConfig,
}

impl PositionSizer {
    pub fn new(config: EntryConfig) -> Self {
        Self { config }
    }

    /// `floor((investment / price) / lot_step) * lot_step`.
    ///
    /// Returns `None` for a non-positive price or lot step.
    pub fn size_for(&self, instrument: &str, price: Decimal) -> Option<SizeDecision> {
        let lot_step = self.config.lot_step_for(instrument);
        if price <= Decimal::ZERO || lot_step <= Decimal::ZERO {
            return None;
        }

        let lots = (self.config.investment_usd / price / lot_step).floor();
        let size = lots * lot_step;
        let notional = size * price;

        if size <= Decimal::ZERO || notional < self.config.min_notional {
            return Some(SizeDecision::BelowMinimum { notional });
        }

        Some(SizeDecision::Size { size, notional })
    }
}
