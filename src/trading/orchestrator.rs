//! Per-instrument decision loop.
//!
//! Each tracked instrument owns one [`PositionOrchestrator`]. It holds the
//! only mutable engine state (cooldowns, loss window, volatility buffer,
//! random source) and turns one [`TickInput`] into one [`Decision`]. It never
//! performs I/O: the caller fetches the inputs and executes the actions.
//!
//! Evaluation order for an open position:
//! 1. forced close on liquidation risk (absolute priority)
//! 2. trend reversal
//! 3. take profit
//! 4. confirmed stop loss
//!
//! Any close is terminal for the tick.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::exit::{Economics, ExitEconomics, LossConfirmationWindow, VolatilityEstimator};
use crate::models::{Action, Position, Side, Snapshot};
use crate::risk::{estimate_liquidation_price, safety_margin, RiskClassifier, RiskTier};

use super::cooldown::{CooldownGate, CooldownReason};
use super::position_sizer::{PositionSizer, SizeDecision};
use super::trend_filter::TrendFilter;
use super::EngineConfig;

/// Everything the engine needs to decide for one instrument on one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    pub snapshot: &'a Snapshot,
    /// Position as re-derived from the venue, `None` when flat
    pub position: Option<&'a Position>,
    /// Instrument is in today's trading set
    pub selected: bool,
    pub trend: Option<Side>,
    /// Raw volatility sample for this tick, if the oracle produced one
    pub volatility: Option<f64>,
}

/// Why a position is being closed.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// Held outside today's trading set
    Deselected,
    RiskForced { margin: f64 },
    TrendReversal { trend: Side },
    TakeProfit { net_return: f64, target: f64 },
    StopLoss { net_return: f64, threshold: f64, breaches: usize },
}

impl CloseReason {
    /// Cooldown armed by this close, if any.
    pub fn cooldown(&self) -> Option<CooldownReason> {
        match self {
            CloseReason::Deselected => None,
            CloseReason::RiskForced { .. } => Some(CooldownReason::Risk),
            CloseReason::TrendReversal { .. }
            | CloseReason::TakeProfit { .. }
            | CloseReason::StopLoss { .. } => Some(CooldownReason::Profit),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::Deselected => "deselected",
            CloseReason::RiskForced { .. } => "risk_forced",
            CloseReason::TrendReversal { .. } => "trend_reversal",
            CloseReason::TakeProfit { .. } => "take_profit",
            CloseReason::StopLoss { .. } => "stop_loss",
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    RiskCooldown { remaining: Duration },
    ProfitCooldown { remaining: Duration },
    /// Flat and not in today's trading set
    Idle,
    NoTrend,
    AdmissionDeclined,
    BelowMinNotional { notional: Decimal },
    InvalidPrice,
    Enter { side: Side, size: Decimal, leverage: u32 },
    Close(CloseReason),
    Hold {
        tier: RiskTier,
        margin: Option<f64>,
        net_return: Option<f64>,
        loss_breaches: usize,
    },
}

/// A verdict and the actions that carry it out, in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub instrument: String,
    pub verdict: Verdict,
    pub actions: Vec<Action>,
}

/// Stateful decision engine for one instrument.
pub struct PositionOrchestrator<R: Rng = StdRng> {
    instrument: String,
    classifier: RiskClassifier,
    economics: ExitEconomics,
    loss_window: LossConfirmationWindow,
    volatility: VolatilityEstimator,
    trend_filter: TrendFilter,
    cooldowns: CooldownGate,
    sizer: PositionSizer,
    liquidation_buffer: f64,
    leverage_choices: Vec<u32>,
    slippage_tolerance: Decimal,
    rng: R,
}

impl<R: Rng> PositionOrchestrator<R> {
    pub fn new(instrument: impl Into<String>, config: &EngineConfig, rng: R) -> Self {
        Self {
            instrument: instrument.into(),
            classifier: RiskClassifier::new(&config.risk),
            economics: ExitEconomics::new(&config.exit),
            loss_window: LossConfirmationWindow::new(
                config.exit.loss_window_secs,
                config.exit.loss_confirm_count,
            ),
            volatility: VolatilityEstimator::new(&config.exit),
            trend_filter: TrendFilter::new(config.entry.admission_probability),
            cooldowns: CooldownGate::new(config.cooldown.risk_secs, config.cooldown.profit_secs),
            sizer: PositionSizer::new(config.entry.clone()),
            liquidation_buffer: config.risk.liquidation_buffer,
            leverage_choices: config.entry.leverage_choices.clone(),
            slippage_tolerance: config.entry.slippage_tolerance,
            rng,
        }
    }

    /// Remaining risk cooldown, `None` once elapsed (which clears it).
    pub fn risk_cooldown(&mut self, now: DateTime<Utc>) -> Option<Duration> {
        if self.cooldowns.is_elapsed(CooldownReason::Risk, now) {
            None
        } else {
            self.cooldowns.remaining(CooldownReason::Risk, now)
        }
    }

    #[cfg(test)]
    pub fn cooldowns(&self) -> &CooldownGate {
        &self.cooldowns
    }

    #[cfg(test)]
    pub fn loss_breaches(&self) -> usize {
        self.loss_window.len()
    }

    /// Decide what to do with this instrument on this tick.
    pub fn evaluate(&mut self, input: &TickInput<'_>) -> Decision {
        let now = input.snapshot.timestamp;

        if let Some(remaining) = self.risk_cooldown(now) {
            debug!(
                instrument = %self.instrument,
                remaining_secs = remaining.num_seconds(),
                "Risk cooldown active, skipping"
            );
            return self.decide(Verdict::RiskCooldown { remaining }, Vec::new());
        }

        match input.position {
            Some(position) => self.evaluate_open(position, input),
            None => self.evaluate_flat(input),
        }
    }

    /// Undo the cooldown armed by `decision` after the executor refused it,
    /// so the close is retried on the next tick.
    pub fn on_rejected(&mut self, decision: &Decision) {
        if let Verdict::Close(reason) = &decision.verdict {
            if let Some(cooldown) = reason.cooldown() {
                self.cooldowns.disarm(cooldown);
            }
        }
    }

    fn evaluate_open(&mut self, position: &Position, input: &TickInput<'_>) -> Decision {
        let now = input.snapshot.timestamp;
        let price = input.snapshot.price;

        if !input.selected {
            info!(
                instrument = %self.instrument,
                "Position held outside today's trading set, closing"
            );
            return self.close(CloseReason::Deselected, now);
        }

        // 1. Liquidation risk
        let liquidation = position.liquidation_price.or_else(|| {
            estimate_liquidation_price(price, position.side, position.leverage, self.liquidation_buffer)
        });
        let margin = safety_margin(price, position.side, liquidation);
        let risk = self.classifier.assess(margin);

        if risk.needs_attention {
            warn!(
                instrument = %self.instrument,
                margin = ?margin,
                tier = %risk.tier,
                "Safety margin below warning threshold"
            );
        }
        if risk.force_close {
            let margin = margin.unwrap_or_default();
            warn!(
                instrument = %self.instrument,
                margin = margin,
                "Safety margin at auto-close level, forcing close"
            );
            return self.close(CloseReason::RiskForced { margin }, now);
        }

        // 2. Trend reversal
        if self.trend_filter.is_reversal(position.side, input.trend) {
            let trend = position.side.opposite();
            info!(
                instrument = %self.instrument,
                held = %position.side,
                trend = %trend,
                "Trend reversed against position"
            );
            return self.close(CloseReason::TrendReversal { trend }, now);
        }

        // 3. Take profit
        let Some(economics) = self.economics.evaluate(position, price, now) else {
            debug!(
                instrument = %self.instrument,
                "Return on equity unavailable, holding"
            );
            return self.hold(risk.tier, margin, None);
        };

        let target = self.economics.profit_target(&economics, &mut self.rng);
        debug!(
            instrument = %self.instrument,
            net_return = economics.net_return,
            target = target,
            holding_fee = economics.holding_fee,
            "Take-profit check"
        );
        if economics.net_return >= target {
            info!(
                instrument = %self.instrument,
                net_return = economics.net_return,
                target = target,
                "Take profit reached"
            );
            return self.close(
                CloseReason::TakeProfit {
                    net_return: economics.net_return,
                    target,
                },
                now,
            );
        }

        // 4. Stop loss
        if let Some(reason) = self.check_stop_loss(position, &economics, input.volatility, now) {
            return self.close(reason, now);
        }

        self.hold(risk.tier, margin, Some(economics.net_return))
    }

    fn check_stop_loss(
        &mut self,
        position: &Position,
        economics: &Economics,
        raw_volatility: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<CloseReason> {
        let smoothed = match raw_volatility {
            Some(raw) => {
                self.volatility.push(raw);
                self.volatility.smoothed(raw)
            }
            None => self.volatility.current()?,
        };

        let threshold = self.volatility.stop_loss_threshold(position.leverage, smoothed);
        let breached = economics.net_return <= threshold;
        let breaches = self.loss_window.observe(breached, now);

        debug!(
            instrument = %self.instrument,
            net_return = economics.net_return,
            threshold = threshold,
            volatility = smoothed,
            "Stop-loss check"
        );

        if !breached {
            return None;
        }

        warn!(
            instrument = %self.instrument,
            net_return = economics.net_return,
            threshold = threshold,
            breaches = breaches,
            "Stop-loss threshold breached"
        );

        if !self.loss_window.is_reached(breaches) {
            return None;
        }
        if !self.volatility.above_noise_floor(smoothed) {
            info!(
                instrument = %self.instrument,
                volatility = smoothed,
                "Volatility below noise floor, deferring stop-loss"
            );
            return None;
        }

        self.loss_window.reset();
        Some(CloseReason::StopLoss {
            net_return: economics.net_return,
            threshold,
            breaches,
        })
    }

    fn evaluate_flat(&mut self, input: &TickInput<'_>) -> Decision {
        let now = input.snapshot.timestamp;
        let price = input.snapshot.price;

        if !input.selected {
            return self.decide(Verdict::Idle, Vec::new());
        }

        if !self.cooldowns.is_elapsed(CooldownReason::Profit, now) {
            let remaining = self
                .cooldowns
                .remaining(CooldownReason::Profit, now)
                .unwrap_or_else(Duration::zero);
            debug!(
                instrument = %self.instrument,
                remaining_secs = remaining.num_seconds(),
                "Profit cooldown active"
            );
            return self.decide(Verdict::ProfitCooldown { remaining }, Vec::new());
        }

        let Some(side) = self.trend_filter.entry_side(input.trend) else {
            debug!(instrument = %self.instrument, "No clear trend, not entering");
            return self.decide(Verdict::NoTrend, Vec::new());
        };

        if !self.trend_filter.admit(&mut self.rng) {
            debug!(instrument = %self.instrument, "Entry not admitted this tick");
            return self.decide(Verdict::AdmissionDeclined, Vec::new());
        }

        let size = match self.sizer.size_for(&self.instrument, price) {
            None => return self.decide(Verdict::InvalidPrice, Vec::new()),
            Some(SizeDecision::BelowMinimum { notional }) => {
                warn!(
                    instrument = %self.instrument,
                    notional = %notional,
                    "Entry size below minimum notional, skipping"
                );
                return self.decide(Verdict::BelowMinNotional { notional }, Vec::new());
            }
            Some(SizeDecision::Size { size, .. }) => size,
        };

        let leverage = self.leverage_choices.choose(&mut self.rng).copied().unwrap_or(1);

        self.loss_window.reset();

        info!(
            instrument = %self.instrument,
            side = %side,
            size = %size,
            leverage = leverage,
            price = %price,
            "Entering with trend"
        );

        let actions = vec![
            Action::SetLeverage {
                instrument: self.instrument.clone(),
                leverage,
            },
            Action::Open {
                instrument: self.instrument.clone(),
                side,
                size,
                leverage,
                slippage_tolerance: self.slippage_tolerance,
            },
        ];
        self.decide(Verdict::Enter { side, size, leverage }, actions)
    }

    fn close(&mut self, reason: CloseReason, now: DateTime<Utc>) -> Decision {
        if let Some(cooldown) = reason.cooldown() {
            self.cooldowns.arm(cooldown, now);
        }
        let action = Action::Close {
            instrument: self.instrument.clone(),
        };
        self.decide(Verdict::Close(reason), vec![action])
    }

    fn hold(&self, tier: RiskTier, margin: Option<f64>, net_return: Option<f64>) -> Decision {
        self.decide(
            Verdict::Hold {
                tier,
                margin,
                net_return,
                loss_breaches: self.loss_window.len(),
            },
            Vec::new(),
        )
    }

    fn decide(&self, verdict: Verdict, actions: Vec<Action>) -> Decision {
        Decision {
            instrument: self.instrument.clone(),
            verdict,
            actions,
        }
    }
}
