use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::api::OrderExecutor;
use crate::models::{Action, ExecutionReport};

/// Logs every action and reports it accepted without touching the venue.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

#[async_trait]
impl OrderExecutor for DryRunExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutionReport> {
        info!(
            instrument = %action.instrument(),
            action = %action,
            "[DRY RUN] Would execute action"
        );
        Ok(ExecutionReport::accepted(action.clone(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_accepts_everything() {
        let action = Action::Close {
            instrument: "SOL".to_string(),
        };
        let report = tokio_test::block_on(DryRunExecutor.execute(&action)).unwrap();
        assert!(report.accepted);
        assert_eq!(report.action, action);
        assert!(report.order_id.is_none());
    }
}
