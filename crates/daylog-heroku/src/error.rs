use thiserror::Error;

/// Failures from the audit-trail fetch boundary.
///
/// `Auth` and `Api` carry the platform's parsed error body; `Network`
/// wraps transport-level failures. All of them terminate the day's run
/// with a recorded outcome; none are retried in-run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;
