pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::LedgerError;
pub use store::ProcessLedger;
pub use types::{ClaimOutcome, FailKind, LedgerStats, ProcessingRecord, RecordFilter, RunStatus};
