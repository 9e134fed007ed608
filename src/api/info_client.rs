//! Hyperliquid info API client: mid prices, account state and candles.
//!
//! Read-only. Every request is a JSON `POST /info`; transient failures
//! (network errors, 5xx, 429) are retried with exponential backoff.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{Position, Side};

use super::types::*;
use super::{MarketGateway, Timeframe};

pub const MAINNET_URL: &str = "https://api.hyperliquid.xyz";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRY_ELAPSED: Duration = Duration::from_secs(20);

/// Client for the Hyperliquid info endpoint.
pub struct HyperliquidInfoClient {
    client: Client,
    base_url: String,
    /// Account whose positions are managed
    user: Option<String>,
}

impl HyperliquidInfoClient {
    /// Create a client against `base_url` ([`MAINNET_URL`], testnet or a local mock).
    pub fn with_base_url(base_url: String, user: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
        })
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Mid price of every listed perp, keyed by coin.
    pub async fn all_mids(&self) -> Result<HashMap<String, String>> {
        self.post(&InfoRequest::AllMids).await
    }

    pub async fn clearinghouse_state(&self, user: &str) -> Result<ClearinghouseState> {
        self.post(&InfoRequest::ClearinghouseState {
            user: user.to_string(),
        })
        .await
    }

    /// The most recent `count` candles of `timeframe`, oldest first.
    pub async fn candles(&self, coin: &str, timeframe: Timeframe, count: usize) -> Result<Vec<Candle>> {
        let end_time = Utc::now().timestamp_millis().max(0) as u64;
        let span = timeframe.minutes() * 60_000 * count as u64;
        let request = InfoRequest::CandleSnapshot {
            req: CandleSnapshotRequest {
                coin: coin.to_string(),
                interval: timeframe.as_str().to_string(),
                start_time: end_time.saturating_sub(span),
                end_time,
            },
        };

        let mut candles: Vec<Candle> = self.post(&request).await?;
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }

    /// All open positions of the configured account.
    pub async fn positions(&self) -> Result<Vec<Position>> {
        let user = self.require_user()?;
        let state = self.clearinghouse_state(user).await?;

        let mut positions = Vec::with_capacity(state.asset_positions.len());
        for ap in &state.asset_positions {
            match parse_position(&ap.position) {
                Ok(Some(position)) => positions.push(position),
                Ok(None) => debug!(coin = %ap.position.coin, "Skipping flat position slot"),
                Err(e) => warn!(coin = %ap.position.coin, error = %e, "Skipping malformed position"),
            }
        }
        Ok(positions)
    }

    fn require_user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| anyhow!("No account address configured (set HL_ACCOUNT_ADDRESS)"))
    }

    async fn post<T: DeserializeOwned>(&self, request: &InfoRequest) -> Result<T> {
        let url = format!("{}/info", self.base_url);
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(MAX_RETRY_ELAPSED),
            ..ExponentialBackoff::default()
        };

        backoff::future::retry(policy, || async {
            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .context("Info request failed")
                .map_err(backoff::Error::transient)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let err = anyhow!("Info request failed: {} - {}", status, body);
                if status.is_server_error() || status.as_u16() == 429 {
                    warn!(status = %status, "Retrying info request");
                    return Err(backoff::Error::transient(err));
                }
                return Err(backoff::Error::permanent(err));
            }

            response
                .json::<T>()
                .await
                .context("Failed to parse info response")
                .map_err(backoff::Error::permanent)
        })
        .await
    }
}

#[async_trait]
impl MarketGateway for HyperliquidInfoClient {
    async fn mid_price(&self, instrument: &str) -> Result<Option<Decimal>> {
        let mids = self.all_mids().await?;
        match mids.get(instrument) {
            Some(raw) => {
                let price = Decimal::from_str(raw)
                    .with_context(|| format!("Invalid mid price for {}: {}", instrument, raw))?;
                Ok(Some(price))
            }
            None => Ok(None),
        }
    }

    async fn account_position(&self, instrument: &str) -> Result<Option<Position>> {
        let user = self.require_user()?;
        let state = self.clearinghouse_state(user).await?;
        match state.asset_positions.iter().find(|ap| ap.position.coin == instrument) {
            // A listed position that cannot be read is not the same as flat
            Some(ap) => parse_position(&ap.position),
            None => Ok(None),
        }
    }
}

fn parse_decimal(raw: Option<&str>) -> Option<Decimal> {
    Decimal::from_str(raw?).ok()
}

fn parse_f64(raw: Option<&str>) -> Option<f64> {
    raw?.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Map venue position data to a [`Position`].
///
/// Returns `Ok(None)` for a zero size (the venue still lists closed slots)
/// and an error when the size or leverage cannot be read. Cumulative
/// funding is reported in USD and is converted to a fraction of margin used.
pub fn parse_position(data: &PositionData) -> Result<Option<Position>> {
    let signed = Decimal::from_str(&data.szi)
        .with_context(|| format!("Invalid position size for {}: {}", data.coin, data.szi))?;
    let Some(side) = Side::from_signed_size(signed) else {
        return Ok(None);
    };
    let entry = parse_decimal(data.entry_px.as_deref()).unwrap_or(Decimal::ZERO);

    let mut position = Position::new(&data.coin, side, signed.abs(), data.leverage.value, entry)
        .ok_or_else(|| anyhow!("Invalid leverage for {}: {}", data.coin, data.leverage.value))?;

    if let Some(liq) = parse_decimal(data.liquidation_px.as_deref()) {
        position = position.with_liquidation_price(liq);
    }
    if let Some(roe) = parse_f64(data.return_on_equity.as_deref()) {
        position = position.with_return_on_equity(roe);
    }

    let margin_used = parse_decimal(data.margin_used.as_deref())
        .and_then(|m| m.to_f64())
        .filter(|m| *m > 0.0);
    let funding_usd = data
        .cum_funding
        .as_ref()
        .and_then(|f| parse_f64(Some(f.since_open.as_str())));
    if let (Some(funding), Some(margin)) = (funding_usd, margin_used) {
        position = position.with_cumulative_funding(funding / margin);
    }

    Ok(Some(position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn data(szi: &str) -> PositionData {
        PositionData {
            coin: "ETH".to_string(),
            szi: szi.to_string(),
            leverage: LeverageInfo { value: 10 },
            entry_px: Some("2000".to_string()),
            liquidation_px: Some("1810".to_string()),
            margin_used: Some("28".to_string()),
            return_on_equity: Some("0.05".to_string()),
            cum_funding: Some(CumulativeFunding {
                since_open: "0.28".to_string(),
            }),
        }
    }

    #[test]
    fn test_parse_short_position() {
        let p = parse_position(&data("-0.14")).unwrap().unwrap();
        assert_eq!(p.side, Side::Short);
        assert_eq!(p.size, dec!(0.14));
        assert_eq!(p.leverage, 10);
        assert_eq!(p.entry_price, dec!(2000));
        assert_eq!(p.liquidation_price, Some(dec!(1810)));
        assert_eq!(p.return_on_equity, Some(0.05));
        assert!((p.cumulative_funding.unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_zero_size_is_flat() {
        assert!(parse_position(&data("0.0")).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_position_is_an_error() {
        assert!(parse_position(&data("garbage")).is_err());

        let mut d = data("0.5");
        d.leverage.value = 0;
        assert!(parse_position(&d).is_err());
    }

    #[test]
    fn test_missing_optional_fields() {
        let mut d = data("0.5");
        d.liquidation_px = None;
        d.margin_used = None;
        d.return_on_equity = None;
        let p = parse_position(&d).unwrap().unwrap();
        assert_eq!(p.side, Side::Long);
        assert_eq!(p.liquidation_price, None);
        assert_eq!(p.return_on_equity, None);
        assert_eq!(p.cumulative_funding, None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            HyperliquidInfoClient::with_base_url("http://localhost:3001/".to_string(), None).unwrap();
        assert_eq!(client.base_url, "http://localhost:3001");
        assert!(client.require_user().is_err());
    }
}
