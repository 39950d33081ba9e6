use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one day's processing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Claim held: a run owns this date right now.
    Processing,
    /// Fetch completed, events_count recorded.
    Success,
    /// Expected operational failure (API auth, network). Terminal.
    Failed,
    /// Unexpected internal failure. Terminal.
    Error,
}

impl RunStatus {
    /// Terminal statuses never transition again without an explicit reset.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Processing)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Processing => "processing",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "processing" => Ok(RunStatus::Processing),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Which terminal failure status to record.
///
/// The split is purely diagnostic. `Failed` is an expected operational
/// error (auth, network, API), `Error` is anything unexpected. Both block
/// re-processing until an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailKind {
    Failed,
    Error,
}

impl FailKind {
    pub fn status(self) -> RunStatus {
        match self {
            FailKind::Failed => RunStatus::Failed,
            FailKind::Error => RunStatus::Error,
        }
    }
}

/// Result of an attempt to claim a date for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This run now exclusively owns the date.
    Acquired,
    /// A previous episode already reached a terminal status. Skip.
    AlreadyDone(RunStatus),
    /// Another live run holds the claim. Back off.
    AlreadyInProgress,
}

/// A persisted per-day processing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingRecord {
    /// Surrogate key; `process_date` is the real identity.
    pub id: i64,
    pub process_date: NaiveDate,
    pub status: RunStatus,
    /// Meaningful only when status is `success`.
    pub events_count: i64,
    pub error_message: Option<String>,
    /// RFC3339, set once at first claim.
    pub created_at: String,
    /// RFC3339, refreshed on every transition.
    pub updated_at: String,
}

/// Optional predicates for the admin listing.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub status: Option<RunStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Aggregate counts over the whole ledger.
///
/// `failed` counts both `failed` and `error` rows; the distinction
/// doesn't matter at the summary level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub processing: i64,
    /// Sum of events_count over successful days.
    pub total_events: i64,
}
