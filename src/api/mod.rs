//! Venue-facing collaborators: market data, trend signals and order execution.
//!
//! The engine only sees these traits. Concrete adapters live alongside them
//! (Hyperliquid info client, EMA trend oracle) and under `crate::execution`.

mod info_client;
mod trend_oracle;
mod types;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Action, ExecutionReport, Position, Side};

pub use info_client::{HyperliquidInfoClient, MAINNET_URL};
pub use trend_oracle::EmaTrendOracle;

/// Candle interval used for trend and volatility signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    pub fn minutes(&self) -> u64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only market and account data.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Current mid price, `None` if the venue does not quote the instrument.
    async fn mid_price(&self, instrument: &str) -> Result<Option<Decimal>>;

    /// Open position for the instrument, `None` when flat.
    async fn account_position(&self, instrument: &str) -> Result<Option<Position>>;
}

/// Directional and volatility signals.
#[async_trait]
pub trait TrendOracle: Send + Sync {
    /// Trend direction, `None` when there is no clear trend.
    async fn trend(&self, instrument: &str, timeframe: Timeframe) -> Result<Option<Side>>;

    /// Raw (unsmoothed) volatility sample.
    async fn volatility(&self, instrument: &str, timeframe: Timeframe) -> Result<f64>;
}

/// Carries out engine actions.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn execute(&self, action: &Action) -> Result<ExecutionReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_serde_uses_interval_strings() {
        assert_eq!(serde_json::to_string(&Timeframe::M15).unwrap(), "\"15m\"");
        let tf: Timeframe = serde_json::from_str("\"4h\"").unwrap();
        assert_eq!(tf, Timeframe::H4);
        assert_eq!(tf.minutes(), 240);
        assert_eq!(tf.to_string(), "4h");
    }
}
