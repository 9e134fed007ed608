//! Data models for positions, market snapshots, and engine actions.

mod action;
mod position;
mod snapshot;

pub use action::{Action, ExecutionReport};
pub use position::{Position, Side};
pub use snapshot::Snapshot;
