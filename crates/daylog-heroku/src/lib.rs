pub mod client;
pub mod error;
pub mod source;

pub use client::HerokuAuditClient;
pub use error::FetchError;
pub use source::EventSource;
