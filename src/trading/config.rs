//! Engine configuration.
//!
//! Defaults carry the tuned values the bot runs with in production. Every
//! group can be overridden from a JSON file passed with `--config`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::api::Timeframe;

/// Longest accepted window or cooldown, one year in seconds.
const MAX_DURATION_SECS: i64 = 365 * 24 * 60 * 60;

/// Liquidation-distance thresholds, in percent of current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Below this margin the position needs attention
    pub warning_pct: f64,

    /// Boundary between the Safe and Warning tiers
    pub danger_pct: f64,

    /// At or below this margin the position is force-closed
    pub auto_close_pct: f64,

    /// Fraction of 1/leverage used to estimate an unreported liquidation price
    pub liquidation_buffer: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            warning_pct: 10.0,
            danger_pct: 3.5,
            auto_close_pct: 1.3,
            liquidation_buffer: 0.95,
        }
    }
}

/// Take-profit and stop-loss parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Round-trip trading fee as a fraction of margin
    pub fee_ratio: f64,

    /// Minimum take-profit multiple of total fees
    pub base_multiple: f64,

    /// Upper bound of the random addition to the take-profit multiple
    pub random_multiple: f64,

    /// Hourly funding estimate used when the venue reports none
    pub funding_rate_base: f64,

    /// Base stop-loss return (negative)
    pub max_loss_percent: f64,

    /// Leverage/10 scaling of the stop-loss is capped at this factor
    pub max_leverage_scale: f64,

    /// Consecutive breaches needed to confirm a stop-loss
    pub loss_confirm_count: usize,

    /// Breaches older than this are dropped from the loss window
    pub loss_window_secs: i64,

    /// Number of volatility samples kept for smoothing
    pub volatility_capacity: usize,

    /// Smoothed volatility must exceed this for a stop-loss to confirm
    pub volatility_noise_floor: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            fee_ratio: 0.011,
            base_multiple: 8.6,
            random_multiple: 10.0,
            funding_rate_base: 0.0001,
            max_loss_percent: -0.02,
            max_leverage_scale: 2.0,
            loss_confirm_count: 2,
            loss_window_secs: 3600,
            volatility_capacity: 50,
            volatility_noise_floor: 0.006,
        }
    }
}

/// Re-entry delays after a close.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Delay after a risk-forced close (seconds)
    pub risk_secs: i64,

    /// Delay after a profit, loss or reversal close (seconds)
    pub profit_secs: i64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            risk_secs: 5 * 60,
            profit_secs: 60,
        }
    }
}

/// Entry sizing and admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Quote amount committed per entry (USD)
    pub investment_usd: Decimal,

    /// Default size increment
    pub lot_step: Decimal,

    /// Per-instrument size increments
    pub lot_steps: HashMap<String, Decimal>,

    /// Entries with a smaller notional are skipped (USD)
    pub min_notional: Decimal,

    /// Chance that a trend-aligned tick actually enters (0.0 to 1.0)
    pub admission_probability: f64,

    /// Leverage drawn uniformly from these on every entry
    pub leverage_choices: Vec<u32>,

    /// Slippage tolerance passed with market opens
    pub slippage_tolerance: Decimal,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            investment_usd: dec!(288.66),
            lot_step: dec!(0.01),
            lot_steps: HashMap::new(),
            min_notional: dec!(10),
            admission_probability: 0.3,
            leverage_choices: vec![5, 10, 15, 20, 25],
            slippage_tolerance: dec!(0.01),
        }
    }
}

impl EntryConfig {
    pub fn lot_step_for(&self, instrument: &str) -> Decimal {
        self.lot_steps
            .get(instrument)
            .copied()
            .unwrap_or(self.lot_step)
    }
}

/// Which instruments are tracked and which may be opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Every tracked instrument is evaluated each tick
    pub instruments: Vec<String>,

    /// Open on all instruments instead of one randomly chosen per day
    pub open_all: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            instruments: vec![
                "ETH".to_string(),
                "SOL".to_string(),
                "ZEC".to_string(),
                "ASTER".to_string(),
            ],
            open_all: false,
        }
    }
}

/// Delay between polling ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub base_sleep_secs: u64,
    pub max_jitter_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_sleep_secs: 30,
            max_jitter_secs: 120,
        }
    }
}

/// Trend and volatility signal parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub timeframe: Timeframe,
    pub fast_period: usize,
    pub slow_period: usize,
    /// Candles requested per fetch
    pub lookback_candles: usize,
    /// Relative EMA gap below which the trend is considered flat
    pub neutral_band: f64,
    /// Closes used for the volatility estimate
    pub volatility_window: usize,
    /// Candle cache lifetime (seconds)
    pub cache_ttl_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M15,
            fast_period: 9,
            slow_period: 21,
            lookback_candles: 100,
            neutral_band: 0.0005,
            volatility_window: 20,
            cache_ttl_secs: 10,
        }
    }
}

/// Simulated venue used by the `paper` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Starting cash (USD)
    pub initial_capital: Decimal,

    /// Simulated slippage against mid (0.0 to 1.0)
    pub slippage: Decimal,

    /// Fee rate charged on every fill's notional (0.0 to 1.0)
    pub fee_rate: Decimal,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(1000),
            slippage: dec!(0.0005),
            fee_rate: dec!(0.00045),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskConfig,
    pub exit: ExitConfig,
    pub cooldown: CooldownConfig,
    pub entry: EntryConfig,
    pub selection: SelectionConfig,
    pub pacing: PacingConfig,
    pub oracle: OracleConfig,
    pub paper: PaperConfig,
}

impl EngineConfig {
    /// Load from a JSON file. Missing fields fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.risk;
        if !(r.warning_pct > r.danger_pct && r.danger_pct > r.auto_close_pct && r.auto_close_pct >= 0.0) {
            bail!(
                "Risk thresholds must descend: warning {} > danger {} > auto_close {} >= 0",
                r.warning_pct,
                r.danger_pct,
                r.auto_close_pct
            );
        }
        if r.liquidation_buffer <= 0.0 {
            bail!("liquidation_buffer must be positive");
        }

        let x = &self.exit;
        if x.max_loss_percent >= 0.0 {
            bail!("max_loss_percent must be negative, got {}", x.max_loss_percent);
        }
        if x.random_multiple < 0.0 || x.base_multiple < 0.0 {
            bail!("Take-profit multiples must be non-negative");
        }
        if x.loss_confirm_count == 0 {
            bail!("loss_confirm_count must be at least 1");
        }
        if x.volatility_capacity == 0 {
            bail!("volatility_capacity must be at least 1");
        }

        if !(1..=MAX_DURATION_SECS).contains(&x.loss_window_secs) {
            bail!("loss_window_secs must be within [1, {}]", MAX_DURATION_SECS);
        }

        let c = &self.cooldown;
        if !(0..=MAX_DURATION_SECS).contains(&c.risk_secs) || !(0..=MAX_DURATION_SECS).contains(&c.profit_secs) {
            bail!("Cooldown durations must be within [0, {}] seconds", MAX_DURATION_SECS);
        }

        let e = &self.entry;
        if e.leverage_choices.is_empty() || e.leverage_choices.iter().any(|&l| l < 1) {
            bail!("leverage_choices must be non-empty and all >= 1");
        }
        if !(0.0..=1.0).contains(&e.admission_probability) {
            bail!("admission_probability must be within [0, 1]");
        }
        if e.lot_step <= Decimal::ZERO || e.lot_steps.values().any(|s| *s <= Decimal::ZERO) {
            bail!("Lot steps must be positive");
        }
        if e.investment_usd <= Decimal::ZERO {
            bail!("investment_usd must be positive");
        }

        if self.selection.instruments.is_empty() {
            bail!("At least one instrument must be tracked");
        }

        let o = &self.oracle;
        if o.fast_period == 0 || o.fast_period >= o.slow_period {
            bail!("EMA periods must satisfy 0 < fast < slow");
        }
        if o.volatility_window < 2 {
            bail!("volatility_window must be at least 2");
        }

        let p = &self.paper;
        if p.initial_capital <= Decimal::ZERO {
            bail!("paper.initial_capital must be positive");
        }
        if p.slippage < Decimal::ZERO || p.fee_rate < Decimal::ZERO {
            bail!("paper.slippage and paper.fee_rate must be non-negative");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut config = EngineConfig::default();
        config.risk.danger_pct = 12.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_leverage_choices() {
        let mut config = EngineConfig::default();
        config.entry.leverage_choices.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        let mut config = EngineConfig::default();
        config.exit.loss_window_secs = i64::MAX;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.exit.loss_window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.cooldown.risk_secs = i64::MAX / 100;
        assert!(config.validate().is_err());

        let json = r#"{ "cooldown": { "profit_secs": 9223372036854775807 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "risk": { "auto_close_pct": 2.0 }, "entry": { "lot_steps": { "ETH": "0.001" } } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.risk.auto_close_pct, 2.0);
        assert_eq!(config.risk.warning_pct, 10.0);
        assert_eq!(config.entry.lot_step_for("ETH"), dec!(0.001));
        assert_eq!(config.entry.lot_step_for("SOL"), dec!(0.01));
        config.validate().unwrap();
    }
}
