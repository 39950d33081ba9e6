// The claim contract under contention: any number of independent runs
// against the same database file, exactly one wins each date.

use std::sync::{Arc, Barrier};

use chrono::NaiveDate;
use daylog_ledger::{db, ClaimOutcome, FailKind, ProcessLedger, RunStatus};

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn concurrent_claims_acquire_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap().to_string();

    // Create the schema before the stampede.
    ProcessLedger::new(db::open(&path).unwrap()).unwrap();

    const RUNS: usize = 8;
    let barrier = Arc::new(Barrier::new(RUNS));
    let target = day("2024-09-28");

    let handles: Vec<_> = (0..RUNS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            std::thread::spawn(move || {
                // Each simulated run has its own connection, like a
                // separate process would.
                let ledger = ProcessLedger::new(db::open(&path).unwrap()).unwrap();
                barrier.wait();
                ledger.claim(target).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<ClaimOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let acquired = outcomes
        .iter()
        .filter(|o| matches!(o, ClaimOutcome::Acquired))
        .count();
    assert_eq!(acquired, 1, "exactly one run may win the claim");
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, ClaimOutcome::Acquired | ClaimOutcome::AlreadyInProgress)));
}

#[test]
fn claims_after_terminal_outcome_are_idempotent_skips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap().to_string();

    let target = day("2024-09-28");
    let winner = ProcessLedger::new(db::open(&path).unwrap()).unwrap();
    assert_eq!(winner.claim(target).unwrap(), ClaimOutcome::Acquired);
    winner.complete(target, 17).unwrap();

    // Later independent runs all see the terminal record, from their own
    // connections, with no mutation.
    for _ in 0..4 {
        let ledger = ProcessLedger::new(db::open(&path).unwrap()).unwrap();
        assert_eq!(
            ledger.claim(target).unwrap(),
            ClaimOutcome::AlreadyDone(RunStatus::Success)
        );
    }
    let record = winner.get(target).unwrap().unwrap();
    assert_eq!(record.events_count, 17);
}

#[test]
fn episodes_separated_by_reclaim_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap().to_string();

    let target = day("2024-09-28");
    let first = ProcessLedger::new(db::open(&path).unwrap()).unwrap();
    assert_eq!(first.claim(target).unwrap(), ClaimOutcome::Acquired);

    // Simulate a crashed run: backdate the claim, then reclaim from a
    // second handle.
    let doctor = db::open(&path).unwrap();
    let old = (chrono::Utc::now() - chrono::Duration::hours(3)).to_rfc3339();
    doctor
        .execute(
            "UPDATE processing_log SET updated_at = ?1 WHERE process_date = ?2",
            rusqlite::params![old, target.to_string()],
        )
        .unwrap();

    let second = ProcessLedger::new(db::open(&path).unwrap()).unwrap();
    let freed = second.release_stale(chrono::Duration::hours(1)).unwrap();
    assert_eq!(freed, vec![target]);

    // The new episode runs to its own terminal state.
    assert_eq!(second.claim(target).unwrap(), ClaimOutcome::Acquired);
    second.fail(target, "upstream 503", FailKind::Failed).unwrap();

    // The first run's handle lost ownership: its late write must not land.
    assert!(first.complete(target, 99).is_err());
    let record = second.get(target).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
}
