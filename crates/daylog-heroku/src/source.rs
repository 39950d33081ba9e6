use async_trait::async_trait;
use chrono::NaiveDate;

use daylog_core::types::{AuditEvent, EventFilters};

use crate::error::FetchError;

/// Common interface for an audit-event source.
///
/// The day processor only ever sees this trait; the concrete Heroku
/// client lives behind it so tests can substitute a canned source.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Source name for logging and error messages.
    fn name(&self) -> &str;

    /// Fetch all audit events for one calendar day, oldest first.
    async fn fetch_events(
        &self,
        day: NaiveDate,
        filters: &EventFilters,
    ) -> Result<Vec<AuditEvent>, FetchError>;
}
