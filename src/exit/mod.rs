//! Exit rules: fee-aware returns, take-profit targets, and the stop-loss
//! debounce with its volatility gate.

mod economics;
mod loss_window;
mod volatility;

pub use economics::{Economics, ExitEconomics};
pub use loss_window::LossConfirmationWindow;
pub use volatility::VolatilityEstimator;
