//! Per-tick market observation for one instrument.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price observation produced once per polling tick.
///
/// The timestamp is the engine's only clock: every time-based rule
/// (cooldowns, loss window, holding fee) measures against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Instrument symbol (e.g., "ETH")
    pub instrument: String,

    /// Mid price
    pub price: Decimal,

    /// When the price was observed
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(instrument: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            timestamp,
        }
    }
}
