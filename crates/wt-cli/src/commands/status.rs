//! Status command: read-only snapshot plus today's persisted totals.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};

use wt_core::{AccrualPolicy, IdleSource, StatusSnapshot, format_hours_minutes};
use wt_db::Database;

use crate::commands::update::sample_activity;

/// Builds a snapshot from a live sample and the persisted day row.
///
/// Reads only: the day row is created if absent but the counter is never
/// advanced, so this is safe to call arbitrarily often.
pub fn snapshot<S: IdleSource>(
    db: &mut Database,
    source: &S,
    policy: &AccrualPolicy,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<StatusSnapshot> {
    let activity = sample_activity(source, policy);
    let log = db.get_today(today, now)?;
    Ok(StatusSnapshot {
        activity,
        total_active_secs: log.total_active_secs,
        last_update: log.last_update,
    })
}

pub fn run<W: Write, S: IdleSource>(
    writer: &mut W,
    db: &mut Database,
    source: &S,
    policy: &AccrualPolicy,
    database_path: &Path,
) -> Result<()> {
    let snap = snapshot(db, source, policy, Local::now().date_naive(), Utc::now())?;

    writeln!(writer, "Work tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer)?;
    writeln!(writer, "Status: {}", snap.activity.label())?;
    writeln!(
        writer,
        "Total active time: {}",
        format_hours_minutes(snap.total_active_secs)
    )?;
    writeln!(
        writer,
        "Last update: {}",
        snap.last_update.with_timezone(&Local).format("%H:%M")
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wt_core::{Activity, IdleSample, IdleSourceError};

    use super::*;

    struct FakeIdle {
        idle_secs: u64,
        fail: bool,
    }

    impl IdleSource for FakeIdle {
        fn query_idle(&self) -> Result<IdleSample, IdleSourceError> {
            if self.fail {
                return Err(IdleSourceError::Query("scripted failure".to_string()));
            }
            Ok(IdleSample {
                idle_time: Duration::from_secs(self.idle_secs),
                locked: false,
            })
        }
    }

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn seed(db: &mut Database, day: &str, total: i64, last_update: &str) {
        let tick = db.tick().unwrap();
        tick.get_or_create(date(day), ts(last_update)).unwrap();
        tick.upsert(date(day), total, ts(last_update)).unwrap();
        tick.commit().unwrap();
    }

    #[test]
    fn snapshot_reflects_persisted_totals_and_live_sample() {
        let mut db = Database::open_in_memory().unwrap();
        seed(&mut db, "2025-01-15", 3725, "2025-01-15T09:15:00Z");

        let snap = snapshot(
            &mut db,
            &FakeIdle {
                idle_secs: 0,
                fail: false,
            },
            &AccrualPolicy::default(),
            date("2025-01-15"),
            ts("2025-01-15T09:16:00Z"),
        )
        .unwrap();

        assert_eq!(snap.activity, Activity::Active);
        assert_eq!(snap.total_active_secs, 3725);
        assert_eq!(snap.last_update, ts("2025-01-15T09:15:00Z"));
    }

    #[test]
    fn snapshot_does_not_advance_the_counter() {
        let mut db = Database::open_in_memory().unwrap();
        seed(&mut db, "2025-01-15", 60, "2025-01-15T09:01:00Z");
        let source = FakeIdle {
            idle_secs: 0,
            fail: false,
        };
        let policy = AccrualPolicy::default();

        let first = snapshot(
            &mut db,
            &source,
            &policy,
            date("2025-01-15"),
            ts("2025-01-15T09:05:00Z"),
        )
        .unwrap();
        let second = snapshot(
            &mut db,
            &source,
            &policy,
            date("2025-01-15"),
            ts("2025-01-15T09:30:00Z"),
        )
        .unwrap();

        assert_eq!(first.total_active_secs, second.total_active_secs);
        let log = db.get_log(date("2025-01-15")).unwrap().unwrap();
        assert_eq!(log.total_active_secs, 60);
        assert_eq!(log.last_update, ts("2025-01-15T09:01:00Z"));
    }

    #[test]
    fn snapshot_degrades_to_idle_on_query_failure() {
        let mut db = Database::open_in_memory().unwrap();
        seed(&mut db, "2025-01-15", 60, "2025-01-15T09:01:00Z");

        let snap = snapshot(
            &mut db,
            &FakeIdle {
                idle_secs: 0,
                fail: true,
            },
            &AccrualPolicy::default(),
            date("2025-01-15"),
            ts("2025-01-15T09:05:00Z"),
        )
        .unwrap();

        assert_eq!(snap.activity, Activity::Idle);
        assert_eq!(snap.total_active_secs, 60);
    }

    #[test]
    fn status_command_renders_summary() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("wt.db");
        let mut db = Database::open(&db_path).unwrap();

        let today = Local::now().date_naive();
        let now = Utc::now();
        let tick = db.tick().unwrap();
        tick.get_or_create(today, now).unwrap();
        tick.upsert(today, 3725, now).unwrap();
        tick.commit().unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &FakeIdle {
                idle_secs: 0,
                fail: false,
            },
            &AccrualPolicy::default(),
            &db_path,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Work tracker status"));
        assert!(output.contains("Status: active"));
        assert!(output.contains("Total active time: 01:02"));
    }
}
