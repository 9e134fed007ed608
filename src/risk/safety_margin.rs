//! Safety margin: percentage distance between price and liquidation price.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::models::Side;

/// Safety margin in percent, clamped to `[0, 100]`.
///
/// Returns `None` when the liquidation price is unknown or non-positive,
/// or when the current price is not positive.
pub fn safety_margin(price: Decimal, side: Side, liquidation_price: Option<Decimal>) -> Option<f64> {
    let liq = liquidation_price?.to_f64()?;
    let price = price.to_f64()?;
    if liq <= 0.0 || price <= 0.0 {
        return None;
    }

    let distance = match side {
        Side::Long => price - liq,
        Side::Short => liq - price,
    };
    let margin = (distance / price) * 100.0;
    if !margin.is_finite() {
        return None;
    }

    Some(margin.clamp(0.0, 100.0))
}

/// Approximate liquidation price for positions whose venue reports none.
///
/// `price * (1 - buffer/leverage)` for longs, `price * (1 + buffer/leverage)`
/// for shorts. This ignores maintenance margin tiers and cross-margin
/// collateral, so it is a fallback and never authoritative.
pub fn estimate_liquidation_price(
    price: Decimal,
    side: Side,
    leverage: u32,
    buffer: f64,
) -> Option<Decimal> {
    if leverage == 0 || price <= Decimal::ZERO {
        return None;
    }
    let offset = Decimal::from_f64(buffer / leverage as f64)?;
    let liq = match side {
        Side::Long => price * (Decimal::ONE - offset),
        Side::Short => price * (Decimal::ONE + offset),
    };
    Some(liq)
}
