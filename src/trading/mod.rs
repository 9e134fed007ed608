//! Trading logic: configuration, entry gating, sizing, cooldowns and the
//! per-instrument orchestrator that ties them together.

mod config;
mod cooldown;
mod orchestrator;
mod pacer;
mod position_sizer;
mod selector;
mod trend_filter;

pub use config::{
    EngineConfig, EntryConfig, ExitConfig, OracleConfig, PacingConfig, PaperConfig, RiskConfig,
    SelectionConfig,
};
pub use orchestrator::{CloseReason, Decision, PositionOrchestrator, TickInput, Verdict};
pub use pacer::Pacer;
pub use selector::InstrumentSelector;
