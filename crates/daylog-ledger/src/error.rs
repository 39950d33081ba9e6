use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur within the ledger subsystem.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A complete/fail was attempted on a row this run does not own
    /// (no `processing` row for the date).
    #[error("No processing claim held for {date}")]
    RecordNotOwned { date: NaiveDate },

    /// A stored row could not be decoded (bad status or date text).
    #[error("Corrupt record for {date}: {detail}")]
    InvalidRecord { date: String, detail: String },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
