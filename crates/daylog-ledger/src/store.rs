use std::sync::Mutex;

use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::db::init_db;
use crate::error::{LedgerError, Result};
use crate::types::{
    ClaimOutcome, FailKind, LedgerStats, ProcessingRecord, RecordFilter, RunStatus,
};

const RECORD_SELECT_SQL: &str = "SELECT id, process_date, status, events_count,
        error_message, created_at, updated_at
 FROM processing_log";

/// Thread-safe handle over the per-day processing ledger.
///
/// Wraps a single SQLite connection in a `Mutex`. Cross-process
/// exclusion does not come from this lock; it comes from the UNIQUE
/// constraint on `process_date` and the guarded UPDATEs below, so any
/// number of independent invocations can share the database file.
pub struct ProcessLedger {
    db: Mutex<Connection>,
}

impl ProcessLedger {
    /// Wrap an already-open connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Attempt to atomically acquire the processing claim for `date`.
    ///
    /// One IMMEDIATE transaction: insert a `processing` row if the date is
    /// unseen, otherwise inspect what is already there. Two concurrent
    /// invocations can never both see `Acquired`: whichever INSERT lands
    /// second changes no rows and falls through to the inspection path.
    /// This is the only compare-and-set in the system; every later write
    /// is guarded by `status = 'processing'` instead.
    pub fn claim(&self, date: NaiveDate) -> Result<ClaimOutcome> {
        let mut db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let day = date.to_string();

        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO processing_log
             (process_date, status, events_count, created_at, updated_at)
             VALUES (?1, 'processing', 0, ?2, ?2)",
            rusqlite::params![day, now],
        )?;

        let outcome = if inserted == 1 {
            ClaimOutcome::Acquired
        } else {
            let status_str: String = tx.query_row(
                "SELECT status FROM processing_log WHERE process_date = ?1",
                rusqlite::params![day],
                |row| row.get(0),
            )?;
            let status: RunStatus =
                status_str
                    .parse()
                    .map_err(|detail| LedgerError::InvalidRecord {
                        date: day.clone(),
                        detail,
                    })?;
            if status.is_terminal() {
                ClaimOutcome::AlreadyDone(status)
            } else {
                ClaimOutcome::AlreadyInProgress
            }
        };
        tx.commit()?;

        match outcome {
            ClaimOutcome::Acquired => info!(date = %date, "processing claim acquired"),
            ClaimOutcome::AlreadyDone(status) => {
                debug!(date = %date, %status, "date already has a terminal record")
            }
            ClaimOutcome::AlreadyInProgress => {
                debug!(date = %date, "date is claimed by another run")
            }
        }
        Ok(outcome)
    }

    /// Transition an owned `processing` row to `success`.
    pub fn complete(&self, date: NaiveDate, events_count: u64) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let changed = db.execute(
            "UPDATE processing_log
             SET status = 'success', events_count = ?1,
                 error_message = NULL, updated_at = ?2
             WHERE process_date = ?3 AND status = 'processing'",
            rusqlite::params![events_count as i64, now, date.to_string()],
        )?;
        if changed == 0 {
            return Err(LedgerError::RecordNotOwned { date });
        }
        info!(date = %date, events = events_count, "recorded success");
        Ok(())
    }

    /// Transition an owned `processing` row to `failed` or `error`,
    /// persisting the message for the admin views.
    pub fn fail(&self, date: NaiveDate, message: &str, kind: FailKind) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let status = kind.status();
        let changed = db.execute(
            "UPDATE processing_log
             SET status = ?1, error_message = ?2, updated_at = ?3
             WHERE process_date = ?4 AND status = 'processing'",
            rusqlite::params![status.to_string(), message, now, date.to_string()],
        )?;
        if changed == 0 {
            return Err(LedgerError::RecordNotOwned { date });
        }
        info!(date = %date, %status, "recorded failure");
        Ok(())
    }

    /// Delete a `processing` row so the date becomes claimable again.
    ///
    /// Returns false when no claim was held. Terminal rows are left alone;
    /// use [`reset`](Self::reset) for those.
    pub fn release(&self, date: NaiveDate) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "DELETE FROM processing_log
             WHERE process_date = ?1 AND status = 'processing'",
            rusqlite::params![date.to_string()],
        )?;
        Ok(changed > 0)
    }

    /// Release every `processing` row untouched for longer than `threshold`.
    ///
    /// Returns the freed dates. A row whose `updated_at` is inside the
    /// threshold belongs to a run that may still be in flight and is never
    /// touched.
    pub fn release_stale(&self, threshold: Duration) -> Result<Vec<NaiveDate>> {
        let cutoff = (Utc::now() - threshold).to_rfc3339();
        let db = self.db.lock().unwrap();

        let stale: Vec<NaiveDate> = {
            let mut stmt = db.prepare(
                "SELECT process_date FROM processing_log
                 WHERE status = 'processing' AND updated_at < ?1",
            )?;
            let collected: Vec<NaiveDate> = stmt
                .query_map([&cutoff], |row| row.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .filter_map(|s| s.parse().ok())
                .collect();
            collected
        };

        if !stale.is_empty() {
            db.execute(
                "DELETE FROM processing_log
                 WHERE status = 'processing' AND updated_at < ?1",
                [&cutoff],
            )?;
            for date in &stale {
                warn!(date = %date, "released stale processing claim");
            }
        }
        Ok(stale)
    }

    /// Fetch the record for a date, if any.
    pub fn get(&self, date: NaiveDate) -> Result<Option<ProcessingRecord>> {
        let db = self.db.lock().unwrap();
        let sql = format!("{RECORD_SELECT_SQL} WHERE process_date = ?1");
        match db.query_row(&sql, rusqlite::params![date.to_string()], row_to_record) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(LedgerError::Database(e)),
        }
    }

    /// The most recent `limit` records, newest process-date first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ProcessingRecord>> {
        self.list(&RecordFilter::default(), limit)
    }

    /// Filtered listing for the admin surface, newest process-date first.
    pub fn list(&self, filter: &RecordFilter, limit: usize) -> Result<Vec<ProcessingRecord>> {
        let mut sql = String::from(RECORD_SELECT_SQL);
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?");
            args.push(Box::new(status.to_string()));
        }
        if let Some(from) = filter.date_from {
            clauses.push("process_date >= ?");
            args.push(Box::new(from.to_string()));
        }
        if let Some(to) = filter.date_to {
            clauses.push("process_date <= ?");
            args.push(Box::new(to.to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY process_date DESC LIMIT ?");
        args.push(Box::new(limit as i64));

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&sql)?;
        let records = stmt
            .query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                row_to_record,
            )?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    /// Delete records by date, whatever their status. Returns rows removed.
    pub fn delete_dates(&self, dates: &[NaiveDate]) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let mut removed = 0;
        for date in dates {
            removed += db.execute(
                "DELETE FROM processing_log WHERE process_date = ?1",
                rusqlite::params![date.to_string()],
            )?;
        }
        Ok(removed)
    }

    /// Unconditionally delete the record for a date so it can be
    /// re-claimed. Returns false when there was nothing to reset.
    pub fn reset(&self, date: NaiveDate) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let changed = db.execute(
            "DELETE FROM processing_log WHERE process_date = ?1",
            rusqlite::params![date.to_string()],
        )?;
        if changed > 0 {
            info!(date = %date, "record reset");
        }
        Ok(changed > 0)
    }

    /// Aggregate counts over the whole ledger.
    pub fn stats(&self) -> Result<LedgerStats> {
        let db = self.db.lock().unwrap();
        let stats = db.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status IN ('failed','error') THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'success' THEN events_count ELSE 0 END), 0)
             FROM processing_log",
            [],
            |row| {
                Ok(LedgerStats {
                    total: row.get(0)?,
                    succeeded: row.get(1)?,
                    failed: row.get(2)?,
                    processing: row.get(3)?,
                    total_events: row.get(4)?,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Map a SELECT row (column order from RECORD_SELECT_SQL) to a record.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessingRecord> {
    let date_str: String = row.get(1)?;
    let status_str: String = row.get(2)?;
    let process_date: NaiveDate = date_str.parse().map_err(|e: chrono::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let status: RunStatus = status_str.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(ProcessingRecord {
        id: row.get(0)?,
        process_date,
        status,
        events_count: row.get(3)?,
        error_message: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> ProcessLedger {
        ProcessLedger::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn claim_then_complete_records_success() {
        let ledger = ledger();
        let d = day("2024-09-28");

        assert_eq!(ledger.claim(d).unwrap(), ClaimOutcome::Acquired);
        ledger.complete(d, 17).unwrap();

        let record = ledger.get(d).unwrap().expect("record missing");
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.events_count, 17);
        assert!(record.error_message.is_none());
    }

    #[test]
    fn second_claim_sees_terminal_record() {
        let ledger = ledger();
        let d = day("2024-09-28");

        assert_eq!(ledger.claim(d).unwrap(), ClaimOutcome::Acquired);
        ledger.complete(d, 3).unwrap();
        assert_eq!(
            ledger.claim(d).unwrap(),
            ClaimOutcome::AlreadyDone(RunStatus::Success)
        );
    }

    #[test]
    fn second_claim_while_processing_backs_off() {
        let ledger = ledger();
        let d = day("2024-09-28");

        assert_eq!(ledger.claim(d).unwrap(), ClaimOutcome::Acquired);
        assert_eq!(ledger.claim(d).unwrap(), ClaimOutcome::AlreadyInProgress);
    }

    #[test]
    fn failed_date_stays_failed_until_reset() {
        let ledger = ledger();
        let d = day("2024-09-28");

        ledger.claim(d).unwrap();
        ledger.fail(d, "connection refused", FailKind::Failed).unwrap();

        assert_eq!(
            ledger.claim(d).unwrap(),
            ClaimOutcome::AlreadyDone(RunStatus::Failed)
        );
        let record = ledger.get(d).unwrap().unwrap();
        assert_eq!(record.error_message.as_deref(), Some("connection refused"));

        assert!(ledger.reset(d).unwrap());
        assert!(ledger.get(d).unwrap().is_none());
        assert_eq!(ledger.claim(d).unwrap(), ClaimOutcome::Acquired);
    }

    #[test]
    fn complete_without_claim_is_not_owned() {
        let ledger = ledger();
        let d = day("2024-09-28");

        assert!(matches!(
            ledger.complete(d, 1),
            Err(LedgerError::RecordNotOwned { .. })
        ));

        // A terminal row is not owned either.
        ledger.claim(d).unwrap();
        ledger.complete(d, 1).unwrap();
        assert!(matches!(
            ledger.fail(d, "late", FailKind::Error),
            Err(LedgerError::RecordNotOwned { .. })
        ));
    }

    #[test]
    fn release_only_touches_processing_rows() {
        let ledger = ledger();
        let d = day("2024-09-28");

        ledger.claim(d).unwrap();
        assert!(ledger.release(d).unwrap());
        assert!(ledger.get(d).unwrap().is_none());

        ledger.claim(d).unwrap();
        ledger.complete(d, 2).unwrap();
        assert!(!ledger.release(d).unwrap());
        assert!(ledger.get(d).unwrap().is_some());
    }

    #[test]
    fn release_stale_frees_old_claims_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        let ledger = ProcessLedger::new(crate::db::open(path).unwrap()).unwrap();
        let stuck = day("2024-09-27");
        let fresh = day("2024-09-28");
        ledger.claim(stuck).unwrap();
        ledger.claim(fresh).unwrap();

        // Backdate the stuck row's updated_at by three hours.
        let doctor = Connection::open(path).unwrap();
        let old = (Utc::now() - Duration::hours(3)).to_rfc3339();
        doctor
            .execute(
                "UPDATE processing_log SET updated_at = ?1 WHERE process_date = ?2",
                rusqlite::params![old, stuck.to_string()],
            )
            .unwrap();

        let freed = ledger.release_stale(Duration::hours(1)).unwrap();
        assert_eq!(freed, vec![stuck]);

        // The stale date is claimable again; the fresh one is untouched.
        assert_eq!(ledger.claim(stuck).unwrap(), ClaimOutcome::Acquired);
        assert_eq!(ledger.claim(fresh).unwrap(), ClaimOutcome::AlreadyInProgress);
    }

    #[test]
    fn list_filters_by_status_and_range() {
        let ledger = ledger();
        for (d, count) in [("2024-09-25", 1), ("2024-09-26", 2), ("2024-09-27", 3)] {
            let d = day(d);
            ledger.claim(d).unwrap();
            ledger.complete(d, count).unwrap();
        }
        let d = day("2024-09-28");
        ledger.claim(d).unwrap();
        ledger.fail(d, "boom", FailKind::Error).unwrap();

        let all = ledger.recent(10).unwrap();
        assert_eq!(all.len(), 4);
        // Newest first.
        assert_eq!(all[0].process_date, day("2024-09-28"));

        let failed = ledger
            .list(
                &RecordFilter {
                    status: Some(RunStatus::Error),
                    ..Default::default()
                },
                10,
            )
            .unwrap();
        assert_eq!(failed.len(), 1);

        let ranged = ledger
            .list(
                &RecordFilter {
                    date_from: Some(day("2024-09-26")),
                    date_to: Some(day("2024-09-27")),
                    ..Default::default()
                },
                10,
            )
            .unwrap();
        assert_eq!(ranged.len(), 2);

        let limited = ledger.recent(2).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn delete_dates_removes_selected_rows() {
        let ledger = ledger();
        for d in ["2024-09-26", "2024-09-27", "2024-09-28"] {
            let d = day(d);
            ledger.claim(d).unwrap();
            ledger.complete(d, 1).unwrap();
        }

        let removed = ledger
            .delete_dates(&[day("2024-09-26"), day("2024-09-28"), day("2024-09-01")])
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(ledger.recent(10).unwrap().len(), 1);
    }

    #[test]
    fn stats_aggregates_by_status() {
        let ledger = ledger();
        assert_eq!(ledger.stats().unwrap().total, 0);

        let a = day("2024-09-26");
        ledger.claim(a).unwrap();
        ledger.complete(a, 10).unwrap();

        let b = day("2024-09-27");
        ledger.claim(b).unwrap();
        ledger.complete(b, 7).unwrap();

        let c = day("2024-09-28");
        ledger.claim(c).unwrap();
        ledger.fail(c, "401", FailKind::Failed).unwrap();

        let d = day("2024-09-29");
        ledger.claim(d).unwrap();

        let stats = ledger.stats().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.total_events, 17);
    }

    #[test]
    fn created_at_survives_transitions() {
        let ledger = ledger();
        let d = day("2024-09-28");

        ledger.claim(d).unwrap();
        let created = ledger.get(d).unwrap().unwrap().created_at;
        ledger.complete(d, 5).unwrap();
        let record = ledger.get(d).unwrap().unwrap();
        assert_eq!(record.created_at, created);
    }
}
