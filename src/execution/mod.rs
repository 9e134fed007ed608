//! Order executors. Live order submission is out of scope; these either log
//! the action or fill it against an in-memory paper book.

mod dry_run;
mod paper;

pub use dry_run::DryRunExecutor;
pub use paper::PaperVenue;
