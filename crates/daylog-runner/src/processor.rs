use chrono::NaiveDate;
use tracing::{error, info, warn};

use daylog_core::types::{AuditEvent, EventFilters};
use daylog_heroku::{EventSource, FetchError};
use daylog_ledger::{ClaimOutcome, FailKind, ProcessLedger, RunStatus};

use crate::error::Result;

/// How one run of the day processor ended.
///
/// Everything here is a recorded (or benignly skipped) outcome; a run
/// that could not even talk to the ledger returns `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// This run owned the date and recorded success.
    Processed { events: u64 },
    /// A previous episode already finished the date. Idempotent no-op.
    Skipped(RunStatus),
    /// Another run holds the claim. Benign back-off.
    InFlight,
    /// Fetch failed operationally; `failed` recorded with the message.
    Failed { message: String },
    /// Unexpected failure; `error` recorded best-effort.
    Errored { message: String },
}

impl RunOutcome {
    /// Benign outcomes exit 0; recorded failures exit 1.
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            RunOutcome::Processed { .. } | RunOutcome::Skipped(_) | RunOutcome::InFlight
        )
    }
}

/// Orchestrates one claim-to-terminal episode for a single date.
pub struct DayProcessor<'a> {
    ledger: &'a ProcessLedger,
    source: &'a dyn EventSource,
    filters: EventFilters,
}

impl<'a> DayProcessor<'a> {
    pub fn new(
        ledger: &'a ProcessLedger,
        source: &'a dyn EventSource,
        filters: EventFilters,
    ) -> Self {
        Self {
            ledger,
            source,
            filters,
        }
    }

    /// Process one calendar day: claim, fetch, record exactly one terminal
    /// outcome. The fetch is never retried within a run; retries happen
    /// through a later invocation after a reclaim or reset.
    pub async fn run(&self, date: NaiveDate) -> Result<RunOutcome> {
        match self.ledger.claim(date)? {
            ClaimOutcome::AlreadyDone(status) => {
                info!(%date, %status, "already processed, skipping");
                return Ok(RunOutcome::Skipped(status));
            }
            ClaimOutcome::AlreadyInProgress => {
                warn!(%date, "another run is processing this date, skipping");
                return Ok(RunOutcome::InFlight);
            }
            ClaimOutcome::Acquired => {}
        }

        info!(%date, source = self.source.name(), "fetching audit events");
        match self.source.fetch_events(date, &self.filters).await {
            Ok(events) => {
                log_events(&events);
                let count = events.len() as u64;
                match self.ledger.complete(date, count) {
                    Ok(()) => {
                        info!(%date, events = count, "processing complete");
                        Ok(RunOutcome::Processed { events: count })
                    }
                    Err(e) => Ok(self.record_unexpected(
                        date,
                        format!("fetched {count} events but recording success failed: {e}"),
                    )),
                }
            }
            Err(fetch_err) => {
                let message = fetch_err.to_string();
                error!(%date, %message, "audit event fetch failed");
                match classify(&fetch_err) {
                    FailKind::Failed => match self.ledger.fail(date, &message, FailKind::Failed) {
                        Ok(()) => Ok(RunOutcome::Failed { message }),
                        Err(e) => Ok(self.record_unexpected(
                            date,
                            format!("{message}; recording the failure also failed: {e}"),
                        )),
                    },
                    FailKind::Error => Ok(self.record_unexpected(date, message)),
                }
            }
        }
    }

    /// Best-effort `error` write so the date does not sit in `processing`.
    /// If even this write fails the claim is left for the reclaimer.
    fn record_unexpected(&self, date: NaiveDate, message: String) -> RunOutcome {
        error!(%date, %message, "unexpected processing failure");
        if let Err(e) = self.ledger.fail(date, &message, FailKind::Error) {
            error!(%date, error = %e, "could not record error status; claim left for the reclaimer");
        }
        RunOutcome::Errored { message }
    }
}

/// Auth, API and transport failures are expected operational errors; a
/// malformed response body is not.
fn classify(err: &FetchError) -> FailKind {
    match err {
        FetchError::Auth(_) | FetchError::Api { .. } | FetchError::Network(_) => FailKind::Failed,
        FetchError::Parse(_) => FailKind::Error,
    }
}

/// Events are not persisted; the audit trail of this tool is its log.
fn log_events(events: &[AuditEvent]) {
    for event in events {
        info!(
            created_at = event.created_at.as_deref().unwrap_or("-"),
            actor = event.actor_email().unwrap_or("-"),
            r#type = event.event_type.as_deref().unwrap_or("-"),
            action = event.action.as_deref().unwrap_or("-"),
            "audit event"
        );
    }
}
