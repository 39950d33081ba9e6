use rusqlite::Connection;

use crate::error::Result;

/// Open the ledger database at `path` with the pragmas every writer needs.
///
/// WAL so concurrent CLI invocations (the whole point of the claim table)
/// don't fail on the first overlapping write; busy_timeout so a second
/// writer waits out a short commit instead of erroring.
pub fn open(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA busy_timeout=5000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(conn)
}

/// Initialise the ledger schema in `conn`.
///
/// Creates the `processing_log` table (idempotent). One row per calendar
/// day; the UNIQUE constraint on `process_date` is what makes `claim`
/// atomic. The status indexes keep the reclaimer's sweep and the
/// duplicate check cheap as history accumulates.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS processing_log (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            process_date  TEXT    NOT NULL UNIQUE,  -- ISO YYYY-MM-DD
            status        TEXT    NOT NULL,
            events_count  INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_processing_log_status
            ON processing_log (status);
        CREATE INDEX IF NOT EXISTS idx_processing_log_date_status
            ON processing_log (process_date, status);
        ",
    )?;
    Ok(())
}
