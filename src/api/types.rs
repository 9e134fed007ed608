//! Request and response types for the Hyperliquid info endpoint.
//!
//! Numeric fields arrive as decimal strings and are parsed at the edge.

use serde::{Deserialize, Serialize};

/// Body of a `POST /info` request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum InfoRequest {
    #[serde(rename = "allMids")]
    AllMids,

    #[serde(rename = "clearinghouseState")]
    ClearinghouseState { user: String },

    #[serde(rename = "candleSnapshot")]
    CandleSnapshot { req: CandleSnapshotRequest },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshotRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: u64,
    pub end_time: u64,
}

/// Account state from `clearinghouseState`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    pub position: PositionData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed size: positive long, negative short
    pub szi: String,
    pub leverage: LeverageInfo,
    pub entry_px: Option<String>,
    pub liquidation_px: Option<String>,
    #[serde(default)]
    pub margin_used: Option<String>,
    #[serde(default)]
    pub return_on_equity: Option<String>,
    #[serde(default)]
    pub cum_funding: Option<CumulativeFunding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeverageInfo {
    pub value: u32,
}

/// Funding paid in USD; positive means the position paid.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeFunding {
    pub since_open: String,
}

/// One bar from `candleSnapshot`, reduced to what the signals read.
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    #[serde(rename = "t")]
    pub open_time: u64,
    #[serde(rename = "c")]
    pub close: String,
}
