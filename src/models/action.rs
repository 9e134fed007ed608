//! Decisions emitted by the engine and the executor's answer to them.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::Side;

/// An order-level instruction for the external executor.
///
/// The engine only decides; it never assumes an action succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Open {
        instrument: String,
        side: Side,
        size: Decimal,
        leverage: u32,
        slippage_tolerance: Decimal,
    },
    Close {
        instrument: String,
    },
    SetLeverage {
        instrument: String,
        leverage: u32,
    },
}

impl Action {
    pub fn instrument(&self) -> &str {
        match self {
            Action::Open { instrument, .. }
            | Action::Close { instrument }
            | Action::SetLeverage { instrument, .. } => instrument,
        }
    }

}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Open {
                instrument,
                side,
                size,
                leverage,
                ..
            } => write!(f, "OPEN {} {} {} @ {}x", side, size, instrument, leverage),
            Action::Close { instrument } => write!(f, "CLOSE {}", instrument),
            Action::SetLeverage {
                instrument,
                leverage,
            } => write!(f, "LEVERAGE {} {}x", instrument, leverage),
        }
    }
}

/// Executor response for a single action.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub action: Action,
    pub accepted: bool,
    pub order_id: Option<String>,
    pub message: String,
}

impl ExecutionReport {
    pub fn accepted(action: Action, order_id: Option<String>) -> Self {
        Self {
            action,
            accepted: true,
            order_id,
            message: "accepted".to_string(),
        }
    }

    pub fn rejected(action: Action, message: impl Into<String>) -> Self {
        Self {
            action,
            accepted: false,
            order_id: None,
            message: message.into(),
        }
    }
}
