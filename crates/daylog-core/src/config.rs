use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::EventFilters;

/// Top-level config (daylog.toml + DAYLOG_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaylogConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Absent for admin-only use; `run` requires it.
    #[serde(default)]
    pub heroku: Option<HerokuConfig>,
    /// Default event filters applied to every fetch. All optional.
    #[serde(default)]
    pub filters: EventFilters,
    #[serde(default)]
    pub reclaim: ReclaimConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Heroku Platform API access.
///
/// `token` needs read access to the enterprise account's audit trail.
/// Override via env: DAYLOG_HEROKU_TOKEN / DAYLOG_HEROKU_ACCOUNT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HerokuConfig {
    pub token: String,
    /// Enterprise account ID or name.
    pub account: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

/// Stuck-claim reclamation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimConfig {
    /// A `processing` row untouched for this many hours is considered
    /// abandoned and released.
    #[serde(default = "default_reclaim_hours")]
    pub hours: u64,
    /// Run reclamation before every processing run (in addition to the
    /// standalone `cleanup` command).
    #[serde(default = "bool_true")]
    pub auto: bool,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            hours: default_reclaim_hours(),
            auto: true,
        }
    }
}

fn bool_true() -> bool {
    true
}

fn default_reclaim_hours() -> u64 {
    24
}

fn default_base_url() -> String {
    "https://api.heroku.com".to_string()
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.daylog/daylog.db", home)
}

impl DaylogConfig {
    /// Load config from a TOML file with DAYLOG_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.daylog/daylog.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: DaylogConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DAYLOG_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.daylog/daylog.toml", home)
}
