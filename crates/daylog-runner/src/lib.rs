pub mod error;
pub mod processor;
pub mod reclaim;

pub use error::RunError;
pub use processor::{DayProcessor, RunOutcome};
pub use reclaim::Reclaimer;
