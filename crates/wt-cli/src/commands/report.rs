//! Report command: recent daily totals.

use std::io::Write;

use anyhow::Result;
use chrono::Local;

use wt_core::format_hours_minutes;
use wt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, days: usize) -> Result<()> {
    let logs = db.recent_logs(days)?;

    if logs.is_empty() {
        writeln!(writer, "No days recorded.")?;
        return Ok(());
    }

    writeln!(writer, "{:<12} {:>8}  {}", "Date", "Active", "Last update")?;
    for log in logs {
        writeln!(
            writer,
            "{:<12} {:>8}  {}",
            log.date.to_string(),
            format_hours_minutes(log.total_active_secs),
            log.last_update.with_timezone(&Local).format("%H:%M")
        )?;
    }

    Ok(())
}
