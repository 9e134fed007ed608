//! Net return on equity after fees and funding, and the take-profit target.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::Position;
use crate::trading::ExitConfig;

/// Fee-adjusted return figures for one position at one price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Economics {
    /// Return on equity before holding costs
    pub gross_return: f64,
    /// Funding paid since open, as a fraction of margin
    pub holding_fee: f64,
    /// `gross_return - holding_fee`
    pub net_return: f64,
    /// Trading fee plus holding fee
    pub total_fee: f64,
}

/// Computes returns and profit thresholds.
#[derive(Debug, Clone)]
pub struct ExitEconomics {
    fee_ratio: f64,
    base_multiple: f64,
    random_multiple: f64,
    funding_rate_base: f64,
}

impl ExitEconomics {
    pub fn new(config: &ExitConfig) -> Self {
        Self {
            fee_ratio: config.fee_ratio,
            base_multiple: config.base_multiple,
            random_multiple: config.random_multiple,
            funding_rate_base: config.funding_rate_base,
        }
    }

    /// Reported ROE when present, otherwise the side-signed price return.
    ///
    /// `None` when neither is available (no ROE and entry price <= 0).
    pub fn gross_return(&self, position: &Position, price: Decimal) -> Option<f64> {
        if let Some(roe) = position.return_on_equity.filter(|r| r.is_finite()) {
            return Some(roe);
        }

        let entry = position.entry_price.to_f64()?;
        let price = price.to_f64()?;
        if entry <= 0.0 {
            return None;
        }
        Some((price - entry) / entry * position.side.sign())
    }

    /// Reported cumulative funding, else `funding_rate_base * hours * leverage`.
    pub fn holding_fee(&self, position: &Position, now: DateTime<Utc>) -> f64 {
        if let Some(funding) = position.cumulative_funding.filter(|f| f.is_finite()) {
            return funding;
        }

        let hours = position.hours_held(now).unwrap_or(0.0);
        self.funding_rate_base * hours * position.leverage as f64
    }

    pub fn evaluate(&self, position: &Position, price: Decimal, now: DateTime<Utc>) -> Option<Economics> {
        let gross_return = self.gross_return(position, price)?;
        let holding_fee = self.holding_fee(position, now);

        Some(Economics {
            gross_return,
            holding_fee,
            net_return: gross_return - holding_fee,
            total_fee: self.fee_ratio + holding_fee,
        })
    }

    /// Draws a fresh take-profit multiple in `[base, base + spread)`.
    ///
    /// Redrawn every evaluation so exit levels are not predictable.
    pub fn profit_multiple<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.random_multiple > 0.0 {
            self.base_multiple + rng.gen_range(0.0..self.random_multiple)
        } else {
            self.base_multiple
        }
    }

    /// Take-profit target for this evaluation.
    pub fn profit_target<R: Rng + ?Sized>(&self, economics: &Economics, rng: &mut R) -> f64 {
        self.profit_multiple(rng) * economics.total_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn economics() -> ExitEconomics {
        ExitEconomics::new(&ExitConfig::default())
    }

    #[test]
    fn test_gross_return_fallback_long() {
        let pos = Position::new("ETH", Side::Long, dec!(1), 10, dec!(2000)).unwrap();
        let gross = economics().gross_return(&pos, dec!(2100)).unwrap();
        assert!((gross - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_gross_return_fallback_short() {
        let pos = Position::new("ETH", Side::Short, dec!(1), 10, dec!(2000)).unwrap();
        let gross = economics().gross_return(&pos, dec!(2100)).unwrap();
        assert!((gross + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_reported_roe_wins() {
        let pos = Position::new("ETH", Side::Long, dec!(1), 10, dec!(2000))
            .unwrap()
            .with_return_on_equity(0.42);
        assert_eq!(economics().gross_return(&pos, dec!(2100)), Some(0.42));
    }

    #[test]
    fn test_degenerate_entry_price() {
        let pos = Position::new("ETH", Side::Long, dec!(1), 10, dec!(0)).unwrap();
        assert_eq!(economics().gross_return(&pos, dec!(2100)), None);
        assert!(economics().evaluate(&pos, dec!(2100), Utc::now()).is_none());
    }

    #[test]
    fn test_holding_fee_estimate_and_reported() {
        let now = Utc::now();
        let pos = Position::new("ETH", Side::Long, dec!(1), 10, dec!(2000))
            .unwrap()
            .with_opened_at(now - Duration::hours(5));
        let fee = economics().holding_fee(&pos, now);
        assert!((fee - 0.0001 * 5.0 * 10.0).abs() < 1e-12);

        let reported = pos.clone().with_cumulative_funding(0.003);
        assert_eq!(economics().holding_fee(&reported, now), 0.003);

        let unknown_open = Position::new("ETH", Side::Long, dec!(1), 10, dec!(2000)).unwrap();
        assert_eq!(economics().holding_fee(&unknown_open, now), 0.0);
    }

    #[test]
    fn test_net_and_total_fee() {
        let now = Utc::now();
        let pos = Position::new("ETH", Side::Long, dec!(1), 10, dec!(2000))
            .unwrap()
            .with_return_on_equity(0.2)
            .with_cumulative_funding(0.01);
        let e = economics().evaluate(&pos, dec!(2000), now).unwrap();
        assert!((e.net_return - 0.19).abs() < 1e-12);
        assert!((e.total_fee - 0.021).abs() < 1e-12);
    }

    #[test]
    fn test_profit_multiple_is_seeded_and_bounded() {
        let econ = economics();
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let x = econ.profit_multiple(&mut a);
            assert_eq!(x, econ.profit_multiple(&mut b));
            assert!((8.6..18.6).contains(&x));
        }
    }

    #[test]
    fn test_zero_spread_is_deterministic() {
        let config = ExitConfig {
            random_multiple: 0.0,
            ..Default::default()
        };
        let econ = ExitEconomics::new(&config);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(econ.profit_multiple(&mut rng), 8.6);
    }
}
