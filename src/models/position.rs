//! Leveraged position model as reported by the venue.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position or trend signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Side implied by a signed venue size (`szi`). Zero means flat.
    pub fn from_signed_size(signed: Decimal) -> Option<Self> {
        if signed > Decimal::ZERO {
            Some(Side::Long)
        } else if signed < Decimal::ZERO {
            Some(Side::Short)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open leveraged position for one instrument.
///
/// The engine never writes a position. It is always re-derived from the
/// venue, so whatever the next snapshot reports is the truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol
    pub instrument: String,

    /// Long or short
    pub side: Side,

    /// Absolute position size in base units (always > 0)
    pub size: Decimal,

    /// Leverage multiplier (always >= 1)
    pub leverage: u32,

    /// Average entry price
    pub entry_price: Decimal,

    /// Liquidation price as reported by the venue
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,

    /// Return on equity reported by the venue, as a fraction of margin
    #[serde(default)]
    pub return_on_equity: Option<f64>,

    /// Funding paid since open, as a fraction of margin
    #[serde(default)]
    pub cumulative_funding: Option<f64>,

    /// When the position was opened, if the venue reports it
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Create a position, rejecting empty sizes and sub-1x leverage.
    pub fn new(
        instrument: impl Into<String>,
        side: Side,
        size: Decimal,
        leverage: u32,
        entry_price: Decimal,
    ) -> Option<Self> {
        if size <= Decimal::ZERO || leverage < 1 {
            return None;
        }

        Some(Self {
            instrument: instrument.into(),
            side,
            size,
            leverage,
            entry_price,
            liquidation_price: None,
            return_on_equity: None,
            cumulative_funding: None,
            opened_at: None,
        })
    }

    pub fn with_liquidation_price(mut self, price: Decimal) -> Self {
        self.liquidation_price = Some(price);
        self
    }

    pub fn with_return_on_equity(mut self, roe: f64) -> Self {
        self.return_on_equity = Some(roe);
        self
    }

    pub fn with_cumulative_funding(mut self, funding: f64) -> Self {
        self.cumulative_funding = Some(funding);
        self
    }

    pub fn with_opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = Some(opened_at);
        self
    }

    /// Notional value at the given price.
    pub fn notional(&self, price: Decimal) -> Decimal {
        self.size * price
    }

    /// Unrealized P&L in quote currency at the given price.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        let diff = price - self.entry_price;
        match self.side {
            Side::Long => self.size * diff,
            Side::Short => -self.size * diff,
        }
    }

    /// Margin committed to the position at entry.
    pub fn margin(&self) -> Decimal {
        self.size * self.entry_price / Decimal::from(self.leverage)
    }

    /// Hours between open time and `now`, when the open time is known.
    pub fn hours_held(&self, now: DateTime<Utc>) -> Option<f64> {
        let opened = self.opened_at?;
        let secs = (now - opened).num_milliseconds().max(0) as f64 / 1000.0;
        Some(secs / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_position_invariants() {
        assert!(Position::new("ETH", Side::Long, dec!(0), 10, dec!(2000)).is_none());
        assert!(Position::new("ETH", Side::Long, dec!(-1), 10, dec!(2000)).is_none());
        assert!(Position::new("ETH", Side::Long, dec!(1), 0, dec!(2000)).is_none());
        assert!(Position::new("ETH", Side::Short, dec!(0.1), 1, dec!(2000)).is_some());
    }

    #[test]
    fn test_position_pnl() {
        let long = Position::new("ETH", Side::Long, dec!(2), 10, dec!(2000)).unwrap();
        assert_eq!(long.pnl_at(dec!(2100)), dec!(200));

        let short = Position::new("ETH", Side::Short, dec!(2), 10, dec!(2000)).unwrap();
        assert_eq!(short.pnl_at(dec!(2100)), dec!(-200));
        assert_eq!(short.margin(), dec!(400));
    }

    #[test]
    fn test_hours_held() {
        let now = Utc::now();
        let pos = Position::new("SOL", Side::Long, dec!(1), 5, dec!(150)).unwrap();
        assert_eq!(pos.hours_held(now), None);

        let pos = pos.with_opened_at(now - Duration::minutes(90));
        let hours = pos.hours_held(now).unwrap();
        assert!((hours - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_side_from_signed_size() {
        assert_eq!(Side::from_signed_size(dec!(0.5)), Some(Side::Long));
        assert_eq!(Side::from_signed_size(dec!(-0.5)), Some(Side::Short));
        assert_eq!(Side::from_signed_size(Decimal::ZERO), None);
        assert_eq!(Side::Long.opposite(), Side::Short);
    }
}
