//! Maps a safety margin to a risk tier and the forced-close decision.

use std::cmp::Ordering;
use std::fmt;

use crate::trading::RiskConfig;

/// Liquidation risk tier, ordered from most to least dangerous.
///
/// `Unknown` (no margin available) is not comparable to any other tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    Critical,
    Warning,
    Safe,
    VerySafe,
    Unknown,
}

impl RiskTier {
    fn rank(&self) -> Option<u8> {
        match self {
            RiskTier::Critical => Some(0),
            RiskTier::Warning => Some(1),
            RiskTier::Safe => Some(2),
            RiskTier::VerySafe => Some(3),
            RiskTier::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Critical => "critical",
            RiskTier::Warning => "warning",
            RiskTier::Safe => "safe",
            RiskTier::VerySafe => "very_safe",
            RiskTier::Unknown => "unknown",
        }
    }
}

impl PartialOrd for RiskTier {
    /// Safer tiers compare greater.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.rank()?.cmp(&other.rank()?))
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one position's margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub margin: Option<f64>,
    pub tier: RiskTier,
    pub needs_attention: bool,
    pub force_close: bool,
}

/// Pure classifier over the configured thresholds.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    warning_pct: f64,
    danger_pct: f64,
    auto_close_pct: f64,
}

impl RiskClassifier {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            warning_pct: config.warning_pct,
            danger_pct: config.danger_pct,
            auto_close_pct: config.auto_close_pct,
        }
    }

    /// Tier boundaries are inclusive on each tier's lower bound.
    pub fn classify(&self, margin: Option<f64>) -> RiskTier {
        let Some(m) = margin else {
            return RiskTier::Unknown;
        };

        if m >= self.warning_pct {
            RiskTier::VerySafe
        } else if m >= self.danger_pct {
            RiskTier::Safe
        } else if m >= self.auto_close_pct {
            RiskTier::Warning
        } else {
            RiskTier::Critical
        }
    }

    /// Margin below the warning threshold.
    pub fn needs_attention(&self, margin: Option<f64>) -> bool {
        margin.is_some_and(|m| m < self.warning_pct)
    }

    /// Margin at or below the auto-close threshold, regardless of profit.
    pub fn must_force_close(&self, margin: Option<f64>) -> bool {
        margin.is_some_and(|m| m <= self.auto_close_pct)
    }

    pub fn assess(&self, margin: Option<f64>) -> RiskAssessment {
        RiskAssessment {
            margin,
            tier: self.classify(margin),
            needs_attention: self.needs_attention(margin),
            force_close: self.must_force_close(margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RiskClassifier {
        RiskClassifier::new(&RiskConfig::default())
    }

    #[test]
    fn test_tier_boundaries() {
        let c = classifier();
        assert_eq!(c.classify(Some(10.0)), RiskTier::VerySafe);
        assert_eq!(c.classify(Some(9.99)), RiskTier::Safe);
        assert_eq!(c.classify(Some(3.5)), RiskTier::Safe);
        assert_eq!(c.classify(Some(3.49)), RiskTier::Warning);
        assert_eq!(c.classify(Some(1.3)), RiskTier::Warning);
        assert_eq!(c.classify(Some(1.29)), RiskTier::Critical);
        assert_eq!(c.classify(Some(0.0)), RiskTier::Critical);
        assert_eq!(c.classify(None), RiskTier::Unknown);
    }

    #[test]
    fn test_tiers_are_monotonic() {
        let c = classifier();
        let margins: Vec<f64> = (0..=1200).map(|i| i as f64 * 0.01).collect();
        for pair in margins.windows(2) {
            let lower = c.classify(Some(pair[0]));
            let higher = c.classify(Some(pair[1]));
            assert!(lower <= higher, "{} -> {:?} vs {} -> {:?}", pair[0], lower, pair[1], higher);
        }
    }

    #[test]
    fn test_unknown_is_incomparable() {
        assert_eq!(RiskTier::Unknown.partial_cmp(&RiskTier::Critical), None);
        assert!(RiskTier::Critical < RiskTier::VerySafe);
    }

    #[test]
    fn test_warning_margin_does_not_force_close() {
        let c = classifier();
        let a = c.assess(Some(2.0));
        assert_eq!(a.tier, RiskTier::Warning);
        assert!(a.needs_attention);
        assert!(!a.force_close);
    }

    #[test]
    fn test_critical_margin_forces_close() {
        let c = classifier();
        let a = c.assess(Some(1.0));
        assert_eq!(a.tier, RiskTier::Critical);
        assert!(a.force_close);

        // Exactly at the threshold still closes
        assert!(c.must_force_close(Some(1.3)));
        assert!(!c.must_force_close(None));
        assert!(!c.needs_attention(None));
    }
}
