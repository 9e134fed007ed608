//! EMA crossover trend and close-to-close volatility from venue candles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use statrs::statistics::Statistics;
use ta::indicators::ExponentialMovingAverage;
use ta::Next;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::Side;
use crate::trading::OracleConfig;

use super::{HyperliquidInfoClient, Timeframe, TrendOracle};

struct CachedCloses {
    fetched_at: Instant,
    closes: Vec<f64>,
}

/// [`TrendOracle`] backed by the info client's candle snapshots.
///
/// Trend and volatility for the same tick share one candle fetch through a
/// short-lived per-instrument cache.
pub struct EmaTrendOracle {
    client: Arc<HyperliquidInfoClient>,
    config: OracleConfig,
    cache: Mutex<HashMap<(String, Timeframe), CachedCloses>>,
}

impl EmaTrendOracle {
    pub fn new(client: Arc<HyperliquidInfoClient>, config: OracleConfig) -> Self {
        Self {
            client,
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn closes(&self, instrument: &str, timeframe: Timeframe) -> Result<Vec<f64>> {
        let key = (instrument.to_string(), timeframe);
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(&key) {
            if cached.fetched_at.elapsed() < ttl {
                return Ok(cached.closes.clone());
            }
        }

        let candles = self
            .client
            .candles(instrument, timeframe, self.config.lookback_candles)
            .await
            .with_context(|| format!("Failed to fetch {} candles for {}", timeframe, instrument))?;

        let closes: Vec<f64> = candles
            .iter()
            .filter_map(|c| c.close.parse::<f64>().ok())
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();

        debug!(
            instrument = %instrument,
            timeframe = %timeframe,
            candles = closes.len(),
            "Fetched candles"
        );

        cache.insert(
            key,
            CachedCloses {
                fetched_at: Instant::now(),
                closes: closes.clone(),
            },
        );
        Ok(closes)
    }
}

#[async_trait]
impl TrendOracle for EmaTrendOracle {
    async fn trend(&self, instrument: &str, timeframe: Timeframe) -> Result<Option<Side>> {
        let closes = self.closes(instrument, timeframe).await?;
        ema_trend(
            &closes,
            self.config.fast_period,
            self.config.slow_period,
            self.config.neutral_band,
        )
    }

    async fn volatility(&self, instrument: &str, timeframe: Timeframe) -> Result<f64> {
        let closes = self.closes(instrument, timeframe).await?;
        return_volatility(&closes, self.config.volatility_window).ok_or_else(|| {
            anyhow!(
                "Not enough {} candles for {} volatility ({} closes)",
                timeframe,
                instrument,
                closes.len()
            )
        })
    }
}

/// Direction of the fast EMA relative to the slow one.
///
/// `None` when the relative gap is within `neutral_band`. Errors when there
/// are fewer closes than the slow period.
pub fn ema_trend(closes: &[f64], fast: usize, slow: usize, neutral_band: f64) -> Result<Option<Side>> {
    if closes.len() < slow {
        bail!("Need at least {} closes for trend, got {}", slow, closes.len());
    }

    let mut fast_ema =
        ExponentialMovingAverage::new(fast).map_err(|e| anyhow!("Invalid fast EMA period: {:?}", e))?;
    let mut slow_ema =
        ExponentialMovingAverage::new(slow).map_err(|e| anyhow!("Invalid slow EMA period: {:?}", e))?;

    let (mut f, mut s) = (0.0, 0.0);
    for &close in closes {
        f = fast_ema.next(close);
        s = slow_ema.next(close);
    }

    if s <= 0.0 {
        return Ok(None);
    }
    let gap = (f - s) / s;
    if gap > neutral_band {
        Ok(Some(Side::Long))
    } else if gap < -neutral_band {
        Ok(Some(Side::Short))
    } else {
        Ok(None)
    }
}

/// Sample standard deviation of simple returns over the last `window` closes.
pub fn return_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window {
        return None;
    }
    let recent = &closes[closes.len() - window..];
    let returns: Vec<f64> = recent.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
    let vol = returns.iter().std_dev();
    vol.is_finite().then_some(vol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rising_closes_trend_long() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        assert_eq!(ema_trend(&closes, 9, 21, 0.0005).unwrap(), Some(Side::Long));
    }

    #[test]
    fn test_falling_closes_trend_short() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        assert_eq!(ema_trend(&closes, 9, 21, 0.0005).unwrap(), Some(Side::Short));
    }

    #[test]
    fn test_flat_closes_have_no_trend() {
        let closes = vec![100.0; 60];
        assert_eq!(ema_trend(&closes, 9, 21, 0.0005).unwrap(), None);
    }

    #[test]
    fn test_too_few_closes() {
        assert!(ema_trend(&[100.0; 5], 9, 21, 0.0005).is_err());
        assert_eq!(return_volatility(&[100.0; 5], 20), None);
    }

    #[test]
    fn test_volatility_of_alternating_returns() {
        // Returns alternate +1% / -1% (approximately)
        let mut closes = vec![100.0];
        for i in 0..20 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last * 1.01 } else { last * 0.99 });
        }
        let vol = return_volatility(&closes, 21).unwrap();
        assert!((vol - 0.01).abs() < 1e-3, "vol = {}", vol);

        assert_eq!(return_volatility(&vec![100.0; 30], 20), Some(0.0));
    }
}
