//! Liquidation risk: distance to liquidation and the tier it maps to.

mod classifier;
mod safety_margin;

pub use classifier::{RiskClassifier, RiskTier};
pub use safety_margin::{estimate_liquidation_price, safety_margin};
