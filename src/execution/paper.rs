//! In-memory paper venue.
//!
//! Fills at the inner gateway's mid price adjusted by slippage, charges a fee
//! on every fill's notional and keeps isolated margin per position. It serves
//! both sides of the engine: [`MarketGateway`] for positions (with return on
//! equity marked to the current mid) and [`OrderExecutor`] for actions.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{MarketGateway, OrderExecutor};
use crate::models::{Action, ExecutionReport, Position, Side};
use crate::risk::estimate_liquidation_price;
use crate::trading::PaperConfig;

/// A position closed on the paper venue.
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub instrument: String,
    pub side: Side,
    pub size: Decimal,
    pub leverage: u32,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Net of the exit fee
    pub pnl: Decimal,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: DateTime<Utc>,
}

struct PaperBook {
    capital: Decimal,
    positions: HashMap<String, Position>,
    leverage: HashMap<String, u32>,
    closed: Vec<ClosedTrade>,
    total_fees: Decimal,
    started_at: DateTime<Utc>,
}

/// Simulated venue over live (or fixed) mid prices.
pub struct PaperVenue {
    prices: Arc<dyn MarketGateway>,
    config: PaperConfig,
    liquidation_buffer: f64,
    book: Mutex<PaperBook>,
}

impl PaperVenue {
    pub fn new(prices: Arc<dyn MarketGateway>, config: PaperConfig, liquidation_buffer: f64) -> Self {
        let book = PaperBook {
            capital: config.initial_capital,
            positions: HashMap::new(),
            leverage: HashMap::new(),
            closed: Vec::new(),
            total_fees: Decimal::ZERO,
            started_at: Utc::now(),
        };
        Self {
            prices,
            config,
            liquidation_buffer,
            book: Mutex::new(book),
        }
    }

    /// Leverage last set for the instrument.
    #[cfg(test)]
    pub async fn leverage(&self, instrument: &str) -> Option<u32> {
        self.book.lock().await.leverage.get(instrument).copied()
    }

    pub async fn closed_trades(&self) -> Vec<ClosedTrade> {
        self.book.lock().await.closed.clone()
    }

    fn fill_price(&self, mid: Decimal, side: Side, opening: bool) -> Decimal {
        // Buying pays up, selling gives up
        let buying = (side == Side::Long) == opening;
        if buying {
            mid * (Decimal::ONE + self.config.slippage)
        } else {
            mid * (Decimal::ONE - self.config.slippage)
        }
    }

    async fn open(
        &self,
        action: &Action,
        instrument: &str,
        side: Side,
        size: Decimal,
        leverage: u32,
        slippage_tolerance: Decimal,
    ) -> Result<ExecutionReport> {
        if self.config.slippage > slippage_tolerance {
            return Ok(ExecutionReport::rejected(
                action.clone(),
                format!(
                    "Simulated slippage {} exceeds tolerance {}",
                    self.config.slippage, slippage_tolerance
                ),
            ));
        }

        let Some(mid) = self.prices.mid_price(instrument).await? else {
            return Ok(ExecutionReport::rejected(action.clone(), "No price available"));
        };

        let fill = self.fill_price(mid, side, true);
        let Some(position) = Position::new(instrument, side, size, leverage, fill) else {
            return Ok(ExecutionReport::rejected(action.clone(), "Invalid size or leverage"));
        };

        let notional = position.notional(fill);
        let margin = position.margin();
        let fee = notional * self.config.fee_rate;

        let mut book = self.book.lock().await;
        if book.positions.contains_key(instrument) {
            return Ok(ExecutionReport::rejected(action.clone(), "Position already open"));
        }
        if margin + fee > book.capital {
            return Ok(ExecutionReport::rejected(
                action.clone(),
                format!("Insufficient paper capital: need {:.2}, have {:.2}", margin + fee, book.capital),
            ));
        }

        let mut position = position.with_opened_at(Utc::now());
        if let Some(liq) = estimate_liquidation_price(fill, side, leverage, self.liquidation_buffer) {
            position = position.with_liquidation_price(liq);
        }

        book.capital -= margin + fee;
        book.total_fees += fee;
        book.positions.insert(instrument.to_string(), position);

        let order_id = Uuid::new_v4().to_string();
        info!(
            instrument = %instrument,
            side = %side,
            size = %size,
            price = %fill,
            leverage = leverage,
            fee = %fee,
            order_id = %order_id,
            "[PAPER] Opened position"
        );
        Ok(ExecutionReport::accepted(action.clone(), Some(order_id)))
    }

    async fn close(&self, action: &Action, instrument: &str) -> Result<ExecutionReport> {
        let Some(mid) = self.prices.mid_price(instrument).await? else {
            return Ok(ExecutionReport::rejected(action.clone(), "No price available"));
        };

        let mut book = self.book.lock().await;
        let Some(position) = book.positions.remove(instrument) else {
            return Ok(ExecutionReport::rejected(action.clone(), "No position to close"));
        };

        let exit_price = self.fill_price(mid, position.side, false);
        let fee = position.notional(exit_price) * self.config.fee_rate;
        let pnl = position.pnl_at(exit_price) - fee;

        book.capital += position.margin() + pnl;
        book.total_fees += fee;
        book.closed.push(ClosedTrade {
            instrument: position.instrument.clone(),
            side: position.side,
            size: position.size,
            leverage: position.leverage,
            entry_price: position.entry_price,
            exit_price,
            pnl,
            opened_at: position.opened_at,
            closed_at: Utc::now(),
        });

        let order_id = Uuid::new_v4().to_string();
        info!(
            instrument = %instrument,
            price = %exit_price,
            pnl = %pnl,
            order_id = %order_id,
            "[PAPER] Closed position"
        );
        Ok(ExecutionReport::accepted(action.clone(), Some(order_id)))
    }

    /// Snapshot of paper performance, open positions marked to current mids.
    pub async fn stats(&self) -> PaperStats {
        let (capital, positions, closed, total_fees, started_at) = {
            let book = self.book.lock().await;
            (
                book.capital,
                book.positions.values().cloned().collect::<Vec<_>>(),
                book.closed.clone(),
                book.total_fees,
                book.started_at,
            )
        };

        let mut unrealized = Decimal::ZERO;
        let mut committed = Decimal::ZERO;
        for position in &positions {
            let price = match self.prices.mid_price(&position.instrument).await {
                Ok(Some(p)) => p,
                Ok(None) => position.entry_price,
                Err(e) => {
                    warn!(instrument = %position.instrument, error = %e, "Using entry price for paper stats");
                    position.entry_price
                }
            };
            unrealized += position.pnl_at(price);
            committed += position.margin();
        }

        let realized: Decimal = closed.iter().map(|t| t.pnl).sum();
        let winners = closed.iter().filter(|t| t.pnl > Decimal::ZERO).count();
        let total = closed.len();
        let win_rate = if total > 0 { winners as f64 / total as f64 } else { 0.0 };

        let equity = capital + committed + unrealized;
        let initial = self.config.initial_capital;
        let return_pct = if initial > Decimal::ZERO {
            (equity - initial) / initial
        } else {
            Decimal::ZERO
        };

        PaperStats {
            initial_capital: initial,
            current_equity: equity,
            cash_available: capital,
            unrealized_pnl: unrealized,
            realized_pnl: realized,
            total_pnl: realized + unrealized,
            return_pct,
            open_positions: positions.len(),
            completed_trades: total,
            win_rate,
            total_fees,
            running_since: started_at,
        }
    }
}

#[async_trait]
impl MarketGateway for PaperVenue {
    async fn mid_price(&self, instrument: &str) -> Result<Option<Decimal>> {
        self.prices.mid_price(instrument).await
    }

    async fn account_position(&self, instrument: &str) -> Result<Option<Position>> {
        let position = self.book.lock().await.positions.get(instrument).cloned();
        let Some(position) = position else {
            return Ok(None);
        };

        let margin = position.margin();
        let Some(mid) = self.prices.mid_price(instrument).await? else {
            return Ok(Some(position));
        };
        if margin <= Decimal::ZERO {
            return Ok(Some(position));
        }

        let roe = (position.pnl_at(mid) / margin).to_f64();
        Ok(Some(match roe {
            Some(roe) => position.with_return_on_equity(roe),
            None => position,
        }))
    }
}

#[async_trait]
impl OrderExecutor for PaperVenue {
    async fn execute(&self, action: &Action) -> Result<ExecutionReport> {
        match action {
            Action::Open {
                instrument,
                side,
                size,
                leverage,
                slippage_tolerance,
            } => {
                self.open(action, instrument, *side, *size, *leverage, *slippage_tolerance)
                    .await
            }
            Action::Close { instrument } => self.close(action, instrument).await,
            Action::SetLeverage {
                instrument,
                leverage,
            } => {
                self.book
                    .lock()
                    .await
                    .leverage
                    .insert(instrument.clone(), *leverage);
                Ok(ExecutionReport::accepted(action.clone(), None))
            }
        }
    }
}

/// Paper trading statistics.
#[derive(Debug, Clone)]
pub struct PaperStats {
    pub initial_capital: Decimal,
    pub current_equity: Decimal,
    pub cash_available: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub return_pct: Decimal,
    pub open_positions: usize,
    pub completed_trades: usize,
    pub win_rate: f64,
    pub total_fees: Decimal,
    pub running_since: DateTime<Utc>,
}

impl std::fmt::Display for PaperStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " PAPER TRADING ")?;
        writeln!(f, "Running since: {}", self.running_since.format("%Y-%m-%d %H:%M"))?;
        writeln!(f)?;
        writeln!(f, "Initial Capital:  ${:.2}", self.initial_capital)?;
        writeln!(f, "Current Equity:   ${:.2}", self.current_equity)?;
        writeln!(f, "Cash Available:   ${:.2}", self.cash_available)?;
        writeln!(f)?;
        writeln!(f, "Unrealized P&L:   ${:.2}", self.unrealized_pnl)?;
        writeln!(f, "Realized P&L:     ${:.2}", self.realized_pnl)?;
        writeln!(f, "Total P&L:        ${:.2} ({:.2}%)",
            self.total_pnl, self.return_pct * dec!(100))?;
        writeln!(f)?;
        writeln!(f, "Open Positions:   {}", self.open_positions)?;
        writeln!(f, "Completed Trades: {}", self.completed_trades)?;
        writeln!(f, "Win Rate:         {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "Total Fees:       ${:.2}", self.total_fees)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}
