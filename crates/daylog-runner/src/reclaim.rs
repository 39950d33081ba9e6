use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use daylog_ledger::ProcessLedger;

use crate::error::Result;

/// Releases claims abandoned by crashed or hung runs.
///
/// A `processing` row is only evidence of a live run while it keeps
/// getting touched; past the threshold it is treated as wreckage and the
/// date is freed for a future invocation. Runs opportunistically before
/// normal processing and standalone via the `cleanup` command.
pub struct Reclaimer<'a> {
    ledger: &'a ProcessLedger,
    threshold: Duration,
}

impl<'a> Reclaimer<'a> {
    pub fn new(ledger: &'a ProcessLedger, threshold_hours: u64) -> Self {
        Self {
            ledger,
            threshold: Duration::hours(threshold_hours as i64),
        }
    }

    /// Free every stale claim, returning the released dates.
    pub fn reclaim(&self) -> Result<Vec<NaiveDate>> {
        let freed = self.ledger.release_stale(self.threshold)?;
        if freed.is_empty() {
            debug!("no stale processing claims");
        } else {
            info!(count = freed.len(), "released stale processing claims");
        }
        Ok(freed)
    }
}
