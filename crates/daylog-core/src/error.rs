use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
