use chrono::{Days, NaiveDate, Utc};

use daylog_ledger::{ProcessLedger, ProcessingRecord, RecordFilter, RunStatus};
use daylog_runner::Reclaimer;

/// Parse a user-supplied `YYYY-MM-DD` date argument.
pub fn parse_date(input: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("invalid date '{input}': expected YYYY-MM-DD"))
}

/// Default processing target: the previous UTC day.
pub fn yesterday_utc() -> NaiveDate {
    Utc::now().date_naive() - Days::new(1)
}

/// Show the 10 most recent records.
pub fn status(ledger: &ProcessLedger) -> anyhow::Result<()> {
    let records = ledger.recent(10)?;
    if records.is_empty() {
        println!("No records found");
        return Ok(());
    }
    print_table(&records);
    Ok(())
}

/// Filtered listing for the admin surface.
pub fn list(
    ledger: &ProcessLedger,
    status: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    limit: usize,
) -> anyhow::Result<()> {
    let filter = RecordFilter {
        status: status
            .map(|s| {
                s.to_lowercase()
                    .parse::<RunStatus>()
                    .map_err(|e| anyhow::anyhow!(e))
            })
            .transpose()?,
        date_from: from.map(parse_date).transpose()?,
        date_to: to.map(parse_date).transpose()?,
    };
    let records = ledger.list(&filter, limit)?;
    if records.is_empty() {
        println!("No records found matching the selected filters");
        return Ok(());
    }
    print_table(&records);
    println!("\n{} record(s)", records.len());
    Ok(())
}

/// Standalone stuck-claim reclamation.
pub fn cleanup(ledger: &ProcessLedger, older_than_hours: u64) -> anyhow::Result<()> {
    let freed = Reclaimer::new(ledger, older_than_hours).reclaim()?;
    if freed.is_empty() {
        println!("No stuck claims found");
    } else {
        for date in &freed {
            println!("Released stuck claim for {date}");
        }
        println!("Released {} claim(s)", freed.len());
    }
    Ok(())
}

/// Delete a single date's record so it can be re-claimed.
pub fn reset(ledger: &ProcessLedger, date: &str) -> anyhow::Result<()> {
    let date = parse_date(date)?;
    if ledger.reset(date)? {
        println!("Deleted record for {date}");
    } else {
        println!("No record found for {date}");
    }
    Ok(())
}

/// Bulk delete by date.
pub fn delete(ledger: &ProcessLedger, dates: &[String]) -> anyhow::Result<()> {
    if dates.is_empty() {
        anyhow::bail!("no dates given");
    }
    let dates = dates
        .iter()
        .map(|d| parse_date(d))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let removed = ledger.delete_dates(&dates)?;
    println!("Deleted {removed} record(s)");
    Ok(())
}

/// Aggregate metrics over the whole ledger.
pub fn stats(ledger: &ProcessLedger) -> anyhow::Result<()> {
    let stats = ledger.stats()?;
    println!("Total records:   {}", stats.total);
    println!("Successful days: {}", stats.succeeded);
    println!("Failed days:     {}", stats.failed);
    println!("In progress:     {}", stats.processing);
    println!("Total events:    {}", stats.total_events);
    Ok(())
}

fn print_table(records: &[ProcessingRecord]) {
    println!(
        "{:<12} {:<12} {:>8}  {:<27} {}",
        "DATE", "STATUS", "EVENTS", "UPDATED", "ERROR"
    );
    println!("{}", "-".repeat(78));
    for r in records {
        println!(
            "{:<12} {:<12} {:>8}  {:<27} {}",
            r.process_date.to_string(),
            r.status.to_string().to_uppercase(),
            r.events_count,
            r.updated_at,
            truncate(r.error_message.as_deref().unwrap_or(""), 40),
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
