use clap::{Parser, Subcommand};
use tracing::{info, warn};

use daylog_core::DaylogConfig;
use daylog_heroku::HerokuAuditClient;
use daylog_ledger::{db, ProcessLedger};
use daylog_runner::{DayProcessor, Reclaimer, RunOutcome};

mod commands;

#[derive(Parser)]
#[command(name = "daylog", version, about = "Daily audit-trail processing ledger")]
struct Cli {
    /// Config file path (default: DAYLOG_CONFIG, then ~/.daylog/daylog.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and record audit events for one day (default: yesterday, UTC)
    Run {
        /// Explicit target date, YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
    },
    /// Create the ledger tables and indexes
    Init,
    /// Show the most recent processing records
    Status,
    /// List records with optional filters
    List {
        /// processing | success | failed | error
        #[arg(long)]
        status: Option<String>,
        /// Earliest process date, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// Latest process date, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Release processing claims older than the staleness threshold
    Cleanup {
        /// Override the configured threshold for this invocation
        #[arg(long)]
        older_than_hours: Option<u64>,
    },
    /// Delete the record for a date so it can be processed again
    Reset { date: String },
    /// Delete records for the given dates, whatever their status
    Delete { dates: Vec<String> },
    /// Aggregate counts over the ledger
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daylog=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: explicit flag > DAYLOG_CONFIG env > ~/.daylog/daylog.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("DAYLOG_CONFIG").ok());
    let config = DaylogConfig::load(config_path.as_deref())?;

    ensure_parent_dir(&config.database.path);
    let ledger = ProcessLedger::new(db::open(&config.database.path)?)?;

    match cli.command {
        Command::Run { date } => {
            let target = match date {
                Some(ref s) => commands::parse_date(s)?,
                None => commands::yesterday_utc(),
            };

            let heroku = config.heroku.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "heroku.token and heroku.account must be configured (daylog.toml or DAYLOG_HEROKU_*)"
                )
            })?;

            // Opportunistic cleanup so a crashed run never blocks a date
            // past the threshold.
            if config.reclaim.auto {
                Reclaimer::new(&ledger, config.reclaim.hours).reclaim()?;
            }

            let client = HerokuAuditClient::from_config(heroku);
            let processor = DayProcessor::new(&ledger, &client, config.filters.clone());
            info!(date = %target, "starting audit events processing");
            let outcome = processor.run(target).await?;

            match &outcome {
                RunOutcome::Processed { events } => {
                    println!("Processed {events} events for {target}");
                }
                RunOutcome::Skipped(status) => {
                    println!(
                        "{target} already recorded as {}, nothing to do",
                        status.to_string().to_uppercase()
                    );
                }
                RunOutcome::InFlight => {
                    warn!(date = %target, "skipped: date is claimed by another run");
                    println!("{target} is being processed by another run");
                }
                RunOutcome::Failed { message } | RunOutcome::Errored { message } => {
                    eprintln!("Processing {target} failed: {message}");
                }
            }
            if !outcome.is_clean() {
                std::process::exit(1);
            }
        }
        Command::Init => {
            // ProcessLedger::new above already ran the schema migration.
            println!("Ledger initialised at {}", config.database.path);
        }
        Command::Status => commands::status(&ledger)?,
        Command::List {
            status,
            from,
            to,
            limit,
        } => commands::list(&ledger, status.as_deref(), from.as_deref(), to.as_deref(), limit)?,
        Command::Cleanup { older_than_hours } => {
            let hours = older_than_hours.unwrap_or(config.reclaim.hours);
            commands::cleanup(&ledger, hours)?;
        }
        Command::Reset { date } => commands::reset(&ledger, &date)?,
        Command::Delete { dates } => commands::delete(&ledger, &dates)?,
        Command::Stats => commands::stats(&ledger)?,
    }

    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
