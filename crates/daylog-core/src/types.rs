use serde::{Deserialize, Serialize};

/// One audit-trail event as returned by the platform API.
///
/// The API envelope is `{"data": [event, ...]}`; events carry more fields
/// than we care about, so everything is optional and unknown keys are
/// ignored. Only the count is persisted; events themselves are logged
/// and dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(default)]
    pub id: Option<String>,
    /// ISO-8601 timestamp of the event, as the API formats it.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Event category, e.g. "app", "team".
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// What happened, e.g. "create", "destroy".
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub actor: Option<EventActor>,
}

/// Who performed the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventActor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuditEvent {
    /// Actor email for log lines, if the API supplied one.
    pub fn actor_email(&self) -> Option<&str> {
        self.actor.as_ref().and_then(|a| a.email.as_deref())
    }
}

/// Optional server-side filters for an audit-trail fetch.
///
/// Field names mirror the API's query parameters (`type`, `action`,
/// `actor`), which keeps the `[filters]` config section 1:1 with the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilters {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    /// Actor email address.
    #[serde(default)]
    pub actor: Option<String>,
}

impl EventFilters {
    pub fn is_empty(&self) -> bool {
        self.event_type.is_none() && self.action.is_none() && self.actor.is_none()
    }
}
