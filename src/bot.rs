//! Bot runner: the I/O shell around the per-instrument orchestrators.
//!
//! Each tick:
//! - picks today's tradable instruments
//! - for every tracked instrument, fetches price, position and signals
//! - lets that instrument's orchestrator decide
//! - executes the resulting actions in order, stopping at the first rejection
//!
//! Failures are contained to the instrument they happened on. Only a
//! shutdown request (Ctrl-C) ends the run loop; it is honored between
//! instruments, never in the middle of one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::api::{MarketGateway, OrderExecutor, TrendOracle};
use crate::errors::{EngineError, EngineResult};
use crate::models::Snapshot;
use crate::trading::{
    CloseReason, Decision, EngineConfig, InstrumentSelector, Pacer, PositionOrchestrator,
    TickInput, Verdict,
};

/// Requests a stop; the bot finishes the instrument it is on first.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Main bot runner.
pub struct Bot {
    config: EngineConfig,
    gateway: Arc<dyn MarketGateway>,
    oracle: Arc<dyn TrendOracle>,
    executor: Arc<dyn OrderExecutor>,
    orchestrators: HashMap<String, PositionOrchestrator>,
    selector: InstrumentSelector,
    pacer: Pacer,
    rng: StdRng,
    shutdown: ShutdownHandle,
    stats: BotStats,
}

impl Bot {
    /// Create a bot over the given collaborators.
    ///
    /// With a `seed`, every random draw (daily selection, pacing, exit
    /// targets, admission, leverage) is reproducible.
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn MarketGateway>,
        oracle: Arc<dyn TrendOracle>,
        executor: Arc<dyn OrderExecutor>,
        seed: Option<u64>,
    ) -> Self {
        let rng_for = |offset: u64| match seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(offset)),
            None => StdRng::from_entropy(),
        };

        let orchestrators = config
            .selection
            .instruments
            .iter()
            .enumerate()
            .map(|(i, instrument)| {
                let orchestrator = PositionOrchestrator::new(instrument.clone(), &config, rng_for(i as u64 + 1));
                (instrument.clone(), orchestrator)
            })
            .collect();

        Self {
            selector: InstrumentSelector::new(&config.selection),
            pacer: Pacer::new(&config.pacing),
            rng: rng_for(0),
            orchestrators,
            config,
            gateway,
            oracle,
            executor,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
                wake: Arc::new(Notify::new()),
            },
            stats: BotStats::default(),
        }
    }

    /// Handle for stopping the bot from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> &BotStats {
        &self.stats
    }

    /// Main run loop.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            instruments = ?self.selector.tracked(),
            open_all = self.config.selection.open_all,
            "Starting bot run loop"
        );

        // Register shutdown handler
        let shutdown = self.shutdown_handle();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.request();
        });

        while !self.shutdown.is_requested() {
            self.tick().await;

            if self.shutdown.is_requested() {
                break;
            }

            let delay = self.pacer.next_delay(&mut self.rng);
            debug!(secs = delay.as_secs(), "Sleeping until next tick");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.shutdown.wake.notified() => {}
            }
        }

        info!(stats = %self.stats.summary(), "Bot shutdown complete");
        Ok(())
    }

    /// Single pass over every tracked instrument.
    pub async fn tick(&mut self) {
        self.stats.ticks += 1;

        let today = Utc::now().date_naive();
        let selected = self.selector.selection(today, &mut self.rng);
        let instruments = self.selector.tracked().to_vec();

        for instrument in &instruments {
            if self.shutdown.is_requested() {
                info!("Shutdown requested, ending tick early");
                break;
            }

            let is_selected = selected.contains(instrument);
            match self.process_instrument(instrument, is_selected).await {
                Ok(decision) => self.stats.record(&decision),
                Err(e) => {
                    self.stats.errors += 1;
                    if matches!(e, EngineError::ActionRejected { .. }) {
                        self.stats.rejections += 1;
                    }
                    warn!(instrument = %instrument, error = %e, "Instrument tick failed");
                }
            }
        }
    }

    async fn process_instrument(&mut self, instrument: &str, selected: bool) -> EngineResult<Decision> {
        let now = Utc::now();
        let timeframe = self.config.oracle.timeframe;

        let price = self
            .gateway
            .mid_price(instrument)
            .await?
            .ok_or_else(|| EngineError::data_unavailable(instrument, "mid price"))?;
        let snapshot = Snapshot::new(instrument, price, now);

        let orchestrator = self
            .orchestrators
            .get_mut(instrument)
            .ok_or_else(|| EngineError::data_unavailable(instrument, "orchestrator"))?;

        // Nothing to fetch while the instrument is paused
        if orchestrator.risk_cooldown(now).is_some() {
            let input = TickInput {
                snapshot: &snapshot,
                position: None,
                selected,
                trend: None,
                volatility: None,
            };
            return Ok(orchestrator.evaluate(&input));
        }

        let position = self.gateway.account_position(instrument).await?;

        let trend = match self.oracle.trend(instrument, timeframe).await {
            Ok(trend) => trend,
            Err(e) => {
                warn!(instrument = %instrument, error = %e, "Trend unavailable, treating as no trend");
                None
            }
        };

        let volatility = if position.is_some() {
            match self.oracle.volatility(instrument, timeframe).await {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(instrument = %instrument, error = %e, "Volatility unavailable");
                    None
                }
            }
        } else {
            None
        };

        let input = TickInput {
            snapshot: &snapshot,
            position: position.as_ref(),
            selected,
            trend,
            volatility,
        };
        let decision = orchestrator.evaluate(&input);
        log_decision(&decision);

        for action in &decision.actions {
            let report = match self.executor.execute(action).await {
                Ok(report) => report,
                Err(e) => {
                    orchestrator.on_rejected(&decision);
                    return Err(e.into());
                }
            };

            if !report.accepted {
                orchestrator.on_rejected(&decision);
                return Err(EngineError::rejected(instrument, report.message));
            }

            debug!(
                instrument = %instrument,
                action = %action,
                order_id = ?report.order_id,
                "Action accepted"
            );
        }

        Ok(decision)
    }
}

fn log_decision(decision: &Decision) {
    match &decision.verdict {
        Verdict::Enter { side, size, leverage } => info!(
            instrument = %decision.instrument,
            side = %side,
            size = %size,
            leverage = leverage,
            "Decision: enter"
        ),
        Verdict::Close(reason) => info!(
            instrument = %decision.instrument,
            reason = reason.label(),
            "Decision: close"
        ),
        Verdict::Hold {
            tier,
            margin,
            net_return,
            loss_breaches,
        } => debug!(
            instrument = %decision.instrument,
            tier = %tier,
            margin = ?margin,
            net_return = ?net_return,
            loss_breaches = loss_breaches,
            "Decision: hold"
        ),
        other => debug!(instrument = %decision.instrument, verdict = ?other, "Decision: no action"),
    }
}

/// Counters for the current run.
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub ticks: u64,
    pub entries: u64,
    pub risk_closes: u64,
    pub reversal_closes: u64,
    pub take_profits: u64,
    pub stop_losses: u64,
    pub deselected_closes: u64,
    pub rejections: u64,
    pub errors: u64,
}

impl BotStats {
    fn record(&mut self, decision: &Decision) {
        match &decision.verdict {
            Verdict::Enter { .. } => self.entries += 1,
            Verdict::Close(CloseReason::RiskForced { .. }) => self.risk_closes += 1,
            Verdict::Close(CloseReason::TrendReversal { .. }) => self.reversal_closes += 1,
            Verdict::Close(CloseReason::TakeProfit { .. }) => self.take_profits += 1,
            Verdict::Close(CloseReason::StopLoss { .. }) => self.stop_losses += 1,
            Verdict::Close(CloseReason::Deselected) => self.deselected_closes += 1,
            _ => {}
        }
    }

    fn summary(&self) -> String {
        format!(
            "ticks={} entries={} closes={} rejections={} errors={}",
            self.ticks,
            self.entries,
            self.risk_closes
                + self.reversal_closes
                + self.take_profits
                + self.stop_losses
                + self.deselected_closes,
            self.rejections,
            self.errors
        )
    }
}

impl std::fmt::Display for BotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Bot Statistics ===")?;
        writeln!(f, "Ticks:           {}", self.ticks)?;
        writeln!(f, "Entries:         {}", self.entries)?;
        writeln!(f, "Risk Closes:     {}", self.risk_closes)?;
        writeln!(f, "Reversals:       {}", self.reversal_closes)?;
        writeln!(f, "Take Profits:    {}", self.take_profits)?;
        writeln!(f, "Stop Losses:     {}", self.stop_losses)?;
        writeln!(f, "Deselected:      {}", self.deselected_closes)?;
        writeln!(f, "Rejections:      {}", self.rejections)?;
        writeln!(f, "Errors:          {}", self.errors)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::api::Timeframe;
    use crate::execution::DryRunExecutor;
    use crate::models::{Action, ExecutionReport, Position, Side};

    struct StaticMarket {
        price: Option<Decimal>,
        position: Mutex<Option<Position>>,
    }

    #[async_trait]
    impl MarketGateway for StaticMarket {
        async fn mid_price(&self, _instrument: &str) -> Result<Option<Decimal>> {
            Ok(self.price)
        }

        async fn account_position(&self, _instrument: &str) -> Result<Option<Position>> {
            Ok(self.position.lock().unwrap().clone())
        }
    }

    struct StaticOracle(Option<Side>);

    #[async_trait]
    impl TrendOracle for StaticOracle {
        async fn trend(&self, _instrument: &str, _timeframe: Timeframe) -> Result<Option<Side>> {
            Ok(self.0)
        }

        async fn volatility(&self, _instrument: &str, _timeframe: Timeframe) -> Result<f64> {
            Ok(0.01)
        }
    }

    struct RejectAll;

    #[async_trait]
    impl OrderExecutor for RejectAll {
        async fn execute(&self, action: &Action) -> Result<ExecutionReport> {
            Ok(ExecutionReport::rejected(action.clone(), "venue unavailable"))
        }
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.selection.instruments = vec!["ETH".to_string()];
        config.entry.admission_probability = 1.0;
        config
    }

    fn market(price: Option<Decimal>, position: Option<Position>) -> Arc<StaticMarket> {
        Arc::new(StaticMarket {
            price,
            position: Mutex::new(position),
        })
    }

    #[tokio::test]
    async fn test_tick_enters_with_trend() {
        let mut bot = Bot::new(
            config(),
            market(Some(dec!(2000)), None),
            Arc::new(StaticOracle(Some(Side::Long))),
            Arc::new(DryRunExecutor),
            Some(7),
        );

        bot.tick().await;
        assert_eq!(bot.stats().ticks, 1);
        assert_eq!(bot.stats().entries, 1);
        assert_eq!(bot.stats().errors, 0);
    }

    #[tokio::test]
    async fn test_missing_price_is_contained() {
        let mut bot = Bot::new(
            config(),
            market(None, None),
            Arc::new(StaticOracle(Some(Side::Long))),
            Arc::new(DryRunExecutor),
            Some(7),
        );

        bot.tick().await;
        bot.tick().await;
        assert_eq!(bot.stats().ticks, 2);
        assert_eq!(bot.stats().errors, 2);
        assert_eq!(bot.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_rejected_risk_close_is_retried() {
        let critical = Position::new("ETH", Side::Long, dec!(0.14), 10, dec!(2000))
            .unwrap()
            .with_liquidation_price(dec!(1990))
            .with_return_on_equity(0.0);
        let mut bot = Bot::new(
            config(),
            market(Some(dec!(2000)), Some(critical)),
            Arc::new(StaticOracle(None)),
            Arc::new(RejectAll),
            Some(7),
        );

        bot.tick().await;
        bot.tick().await;
        // Released cooldown means the close is attempted again, not skipped
        assert_eq!(bot.stats().rejections, 2);
        assert_eq!(bot.stats().risk_closes, 0);
    }

    #[tokio::test]
    async fn test_accepted_risk_close_pauses_instrument() {
        let critical = Position::new("ETH", Side::Long, dec!(0.14), 10, dec!(2000))
            .unwrap()
            .with_liquidation_price(dec!(1990))
            .with_return_on_equity(0.0);
        let mut bot = Bot::new(
            config(),
            market(Some(dec!(2000)), Some(critical)),
            Arc::new(StaticOracle(Some(Side::Long))),
            Arc::new(DryRunExecutor),
            Some(7),
        );

        bot.tick().await;
        bot.tick().await;
        assert_eq!(bot.stats().risk_closes, 1);
        assert_eq!(bot.stats().entries, 0);
        assert_eq!(bot.stats().errors, 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns() {
        let mut bot = Bot::new(
            config(),
            market(Some(dec!(2000)), None),
            Arc::new(StaticOracle(None)),
            Arc::new(DryRunExecutor),
            Some(7),
        );

        let handle = bot.shutdown_handle();
        handle.request();
        bot.run().await.unwrap();
        assert_eq!(bot.stats().ticks, 0);
        assert!(handle.is_requested());
    }

    /// Fails every call for one instrument, quotes the rest.
    struct FailingFor {
        broken: &'static str,
        price: Decimal,
        fail_position: bool,
    }

    #[async_trait]
    impl MarketGateway for FailingFor {
        async fn mid_price(&self, instrument: &str) -> Result<Option<Decimal>> {
            if instrument == self.broken && !self.fail_position {
                anyhow::bail!("connection reset");
            }
            Ok(Some(self.price))
        }

        async fn account_position(&self, instrument: &str) -> Result<Option<Position>> {
            if instrument == self.broken && self.fail_position {
                anyhow::bail!("Invalid leverage for {}: 0", instrument);
            }
            Ok(None)
        }
    }

    /// Accepts every action, requesting shutdown from inside each call.
    struct StopWhileExecuting {
        handle: Mutex<Option<ShutdownHandle>>,
        executed: Mutex<Vec<Action>>,
    }

    #[async_trait]
    impl OrderExecutor for StopWhileExecuting {
        async fn execute(&self, action: &Action) -> Result<ExecutionReport> {
            if let Some(handle) = self.handle.lock().unwrap().as_ref() {
                handle.request();
            }
            self.executed.lock().unwrap().push(action.clone());
            Ok(ExecutionReport::accepted(action.clone(), None))
        }
    }

    fn two_instruments() -> EngineConfig {
        let mut config = config();
        config.selection.instruments = vec!["ETH".to_string(), "SOL".to_string()];
        config.selection.open_all = true;
        config
    }

    #[tokio::test]
    async fn test_failing_instrument_does_not_block_others() {
        let gateway = Arc::new(FailingFor {
            broken: "ETH",
            price: dec!(150),
            fail_position: false,
        });
        let mut bot = Bot::new(
            two_instruments(),
            gateway,
            Arc::new(StaticOracle(Some(Side::Long))),
            Arc::new(DryRunExecutor),
            Some(7),
        );

        bot.tick().await;
        assert_eq!(bot.stats().errors, 1);
        assert_eq!(bot.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_unreadable_position_skips_instrument() {
        let gateway = Arc::new(FailingFor {
            broken: "ETH",
            price: dec!(150),
            fail_position: true,
        });
        let mut bot = Bot::new(
            two_instruments(),
            gateway,
            Arc::new(StaticOracle(Some(Side::Long))),
            Arc::new(DryRunExecutor),
            Some(7),
        );

        bot.tick().await;
        // ETH is skipped rather than treated as flat, SOL still enters
        assert_eq!(bot.stats().errors, 1);
        assert_eq!(bot.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_shutdown_lets_current_instrument_finish() {
        let executor = Arc::new(StopWhileExecuting {
            handle: Mutex::new(None),
            executed: Mutex::new(Vec::new()),
        });
        let mut bot = Bot::new(
            two_instruments(),
            market(Some(dec!(150)), None),
            Arc::new(StaticOracle(Some(Side::Long))),
            executor.clone(),
            Some(7),
        );
        *executor.handle.lock().unwrap() = Some(bot.shutdown_handle());

        bot.run().await.unwrap();

        // The first instrument's leverage and open both went out, the second never started
        let executed = executor.executed.lock().unwrap().clone();
        assert_eq!(executed.len(), 2);
        assert!(matches!(executed[0], Action::SetLeverage { .. }));
        assert!(matches!(executed[1], Action::Open { .. }));
        assert_eq!(bot.stats().ticks, 1);
        assert_eq!(bot.stats().entries, 1);
    }
}
