use thiserror::Error;

/// Errors that escape a processing run.
///
/// Deliberately narrow: fetch failures never surface here, they are
/// translated into a recorded terminal status. Only a ledger that cannot
/// be read or written at claim time aborts the run with nothing recorded.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] daylog_ledger::LedgerError),
}

pub type Result<T> = std::result::Result<T, RunError>;
