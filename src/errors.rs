//! Failures surfaced by the tick loop.
//!
//! Numeric degeneracies (zero entry price, missing liquidation price) are not
//! errors: the pure calculations return `None` and the engine holds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A required input for this tick could not be obtained.
    #[error("{what} unavailable for {instrument}")]
    DataUnavailable { instrument: String, what: String },

    /// The executor refused an action.
    #[error("action rejected for {instrument}: {reason}")]
    ActionRejected { instrument: String, reason: String },

    #[error(transparent)]
    Gateway(#[from] anyhow::Error),
}

impl EngineError {
    pub fn data_unavailable(instrument: &str, what: &str) -> Self {
        EngineError::DataUnavailable {
            instrument: instrument.to_string(),
            what: what.to_string(),
        }
    }

    pub fn rejected(instrument: &str, reason: impl Into<String>) -> Self {
        EngineError::ActionRejected {
            instrument: instrument.to_string(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EngineError::data_unavailable("ETH", "mid price");
        assert_eq!(err.to_string(), "mid price unavailable for ETH");

        let err = EngineError::rejected("SOL", "No position to close");
        assert_eq!(err.to_string(), "action rejected for SOL: No position to close");

        let err: EngineError = anyhow::anyhow!("timeout").into();
        assert_eq!(err.to_string(), "timeout");
    }
}
