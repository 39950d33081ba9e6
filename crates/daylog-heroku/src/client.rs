use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use daylog_core::config::HerokuConfig;
use daylog_core::types::{AuditEvent, EventFilters};

use crate::error::FetchError;
use crate::source::EventSource;

const ACCEPT_HEADER: &str = "application/vnd.heroku+json; version=3";

/// Client for the Heroku Enterprise Accounts audit-trail API.
pub struct HerokuAuditClient {
    client: reqwest::Client,
    token: String,
    account: String,
    base_url: String,
}

impl HerokuAuditClient {
    pub fn new(token: String, account: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            account,
            base_url: base_url.unwrap_or_else(|| "https://api.heroku.com".to_string()),
        }
    }

    pub fn from_config(config: &HerokuConfig) -> Self {
        Self::new(
            config.token.clone(),
            config.account.clone(),
            Some(config.base_url.clone()),
        )
    }
}

/// The API wraps the event list in `{"data": [...]}`.
#[derive(Debug, Deserialize)]
struct EventsEnvelope {
    #[serde(default)]
    data: Vec<AuditEvent>,
}

#[async_trait]
impl EventSource for HerokuAuditClient {
    fn name(&self) -> &str {
        "heroku"
    }

    async fn fetch_events(
        &self,
        day: NaiveDate,
        filters: &EventFilters,
    ) -> Result<Vec<AuditEvent>, FetchError> {
        let url = format!(
            "{}/enterprise-accounts/{}/events",
            self.base_url, self.account
        );
        let params = query_params(day, filters);

        debug!(%url, %day, "fetching audit events");

        // The token goes into the Authorization header and nowhere else,
        // never into logs.
        let resp = self
            .client
            .get(&url)
            .query(&params)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", ACCEPT_HEADER)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = parse_api_error(status, &body);
            warn!(status, %message, "audit-trail API error");
            if status == 401 || status == 403 {
                return Err(FetchError::Auth(message));
            }
            return Err(FetchError::Api { status, message });
        }

        let envelope: EventsEnvelope = resp
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        debug!(count = envelope.data.len(), %day, "audit events retrieved");
        Ok(envelope.data)
    }
}

/// Build the query string: `day` and ascending order always, the three
/// server-side filters only when set.
fn query_params(day: NaiveDate, filters: &EventFilters) -> Vec<(&'static str, String)> {
    let mut params = vec![("day", day.to_string()), ("order", "asc".to_string())];
    if let Some(ref t) = filters.event_type {
        params.push(("type", t.clone()));
    }
    if let Some(ref a) = filters.action {
        params.push(("action", a.clone()));
    }
    if let Some(ref actor) = filters.actor {
        params.push(("actor", actor.clone()));
    }
    params
}

/// Error bodies look like `{"id": "not_found", "message": "..."}`.
/// Empty bodies fall back to a canned description of the status code.
fn parse_api_error(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status_fallback(status).to_string();
    }

    #[derive(Deserialize)]
    struct ApiErrorBody {
        id: Option<String>,
        message: Option<String>,
    }

    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => {
            let id = parsed.id.unwrap_or_else(|| "unknown_error".to_string());
            let message = parsed
                .message
                .unwrap_or_else(|| "No error message provided".to_string());
            format!("{id}: {message}")
        }
        Err(_) => body.to_string(),
    }
}

fn status_fallback(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized - Invalid or missing API token",
        403 => "Forbidden - Insufficient permissions",
        404 => "Not Found - Resource not found (check account ID/name)",
        429 => "Too Many Requests - Rate limit exceeded",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "HTTP error",
    }
}
