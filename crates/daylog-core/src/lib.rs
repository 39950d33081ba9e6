pub mod config;
pub mod error;
pub mod types;

pub use config::DaylogConfig;
pub use error::CoreError;
pub use types::{AuditEvent, EventActor, EventFilters};
