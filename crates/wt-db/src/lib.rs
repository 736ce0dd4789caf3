//! Storage layer for the work tracker.
//!
//! Persists the per-day active-time counter using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. Tick invocations are separate short-lived processes, each
//! with its own connection; the database file is the only shared resource.
//!
//! # Concurrency
//!
//! A tick's read-modify-write runs inside a [`TickTx`], which starts an
//! immediate transaction: the write lock is taken before the read, so two
//! overlapping tick processes serialize instead of both reading the same
//! prior total and losing a delta. A busy timeout makes the second process
//! wait for the lock rather than fail.
//!
//! # Schema
//!
//! One row per local calendar date:
//!
//! - `date`: TEXT primary key, `YYYY-MM-DD`
//! - `total_active_secs`: INTEGER, non-negative, never decreased
//! - `last_update`: TEXT, ISO 8601 UTC (e.g. `2024-01-15T10:30:00.000Z`)

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use thiserror::Error;

use wt_core::DailyLog;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A write attempted to lower a day's total.
    #[error("refusing to decrease total for {date}: stored {stored}s, attempted {attempted}s")]
    DecreasingTotal {
        date: NaiveDate,
        stored: i64,
        attempted: i64,
    },
    /// A stored date could not be parsed.
    #[error("invalid date in daily_log: {value}")]
    DateParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored timestamp could not be parsed.
    #[error("invalid last_update for {date}: {value}")]
    TimestampParse {
        date: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for concurrency considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection
    /// closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS daily_log (
                date TEXT PRIMARY KEY,
                total_active_secs INTEGER NOT NULL DEFAULT 0,
                last_update TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Returns the row for the given date, creating a zero-valued row if
    /// absent.
    ///
    /// Read-or-create happens in a single transaction; two processes racing
    /// on a fresh date cannot create two rows.
    pub fn get_today(
        &mut self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyLog, DbError> {
        let tick = self.tick()?;
        let log = tick.get_or_create(today, now)?;
        tick.commit()?;
        Ok(log)
    }

    /// Starts a tick transaction.
    ///
    /// The transaction takes the write lock immediately and rolls back if
    /// dropped without [`TickTx::commit`].
    pub fn tick(&mut self) -> Result<TickTx<'_>, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(TickTx { tx })
    }

    /// Returns the row for a specific date, if one exists.
    pub fn get_log(&self, date: NaiveDate) -> Result<Option<DailyLog>, DbError> {
        let raw = self
            .conn
            .query_row(
                "SELECT date, total_active_secs, last_update FROM daily_log WHERE date = ?",
                [format_date(date)],
                raw_log_row,
            )
            .optional()?;
        raw.map(parse_log).transpose()
    }

    /// Lists the most recent rows, newest first.
    pub fn recent_logs(&self, limit: usize) -> Result<Vec<DailyLog>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT date, total_active_secs, last_update
            FROM daily_log
            ORDER BY date DESC
            LIMIT ?
            ",
        )?;
        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], raw_log_row)?;
        let mut logs = Vec::new();
        for row in rows {
            logs.push(parse_log(row?)?);
        }
        Ok(logs)
    }
}

/// Scoped write transaction for one tick.
pub struct TickTx<'conn> {
    tx: Transaction<'conn>,
}

impl TickTx<'_> {
    /// Returns the row for the given date, inserting a fresh zero row with
    /// `last_update = now` if absent.
    ///
    /// A freshly created row therefore accrues nothing on the tick that
    /// created it; a day rollover starts the new date from zero.
    pub fn get_or_create(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<DailyLog, DbError> {
        self.tx.execute(
            "
            INSERT INTO daily_log (date, total_active_secs, last_update)
            VALUES (?, 0, ?)
            ON CONFLICT(date) DO NOTHING
            ",
            params![format_date(date), format_timestamp(now)],
        )?;
        let raw = self.tx.query_row(
            "SELECT date, total_active_secs, last_update FROM daily_log WHERE date = ?",
            [format_date(date)],
            raw_log_row,
        )?;
        parse_log(raw)
    }

    /// Writes the new total for the given date, creating the row if needed.
    ///
    /// A total below the stored value is an upstream logic error and is
    /// rejected with [`DbError::DecreasingTotal`] rather than applied.
    pub fn upsert(
        &self,
        date: NaiveDate,
        total_active_secs: i64,
        last_update: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let stored: Option<i64> = self
            .tx
            .query_row(
                "SELECT total_active_secs FROM daily_log WHERE date = ?",
                [format_date(date)],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(stored) = stored {
            if total_active_secs < stored {
                return Err(DbError::DecreasingTotal {
                    date,
                    stored,
                    attempted: total_active_secs,
                });
            }
        }
        self.tx.execute(
            "
            INSERT INTO daily_log (date, total_active_secs, last_update)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(date) DO UPDATE SET
                total_active_secs = excluded.total_active_secs,
                last_update = excluded.last_update
            ",
            params![
                format_date(date),
                total_active_secs,
                format_timestamp(last_update)
            ],
        )?;
        Ok(())
    }

    /// Commits the transaction.
    pub fn commit(self) -> Result<(), DbError> {
        self.tx.commit()?;
        Ok(())
    }
}

struct RawLog {
    date: String,
    total_active_secs: i64,
    last_update: String,
}

fn raw_log_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLog> {
    Ok(RawLog {
        date: row.get(0)?,
        total_active_secs: row.get(1)?,
        last_update: row.get(2)?,
    })
}

fn parse_log(raw: RawLog) -> Result<DailyLog, DbError> {
    let date =
        NaiveDate::parse_from_str(&raw.date, "%Y-%m-%d").map_err(|source| DbError::DateParse {
            value: raw.date.clone(),
            source,
        })?;
    let last_update = DateTime::parse_from_rfc3339(&raw.last_update)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            date: raw.date.clone(),
            value: raw.last_update.clone(),
            source,
        })?;
    Ok(DailyLog {
        date,
        total_active_secs: raw.total_active_secs,
        last_update,
    })
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");
        let mut stmt = db
            .conn
            .prepare("PRAGMA table_info(daily_log)")
            .expect("prepare table_info");
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info")
            .map(|row| row.expect("table_info row"))
            .collect();
        assert_eq!(columns, vec!["date", "total_active_secs", "last_update"]);
    }

    #[test]
    fn get_or_create_inserts_zero_row() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let now = ts("2025-01-15T10:00:00Z");

        let log = db.get_today(date("2025-01-15"), now).expect("get today");
        assert_eq!(log.date, date("2025-01-15"));
        assert_eq!(log.total_active_secs, 0);
        assert_eq!(log.last_update, now);
    }

    #[test]
    fn get_or_create_preserves_existing_row() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let created = ts("2025-01-15T10:00:00Z");
        let later = ts("2025-01-15T11:00:00Z");

        let tick = db.tick().expect("tick");
        tick.get_or_create(date("2025-01-15"), created).unwrap();
        tick.upsert(date("2025-01-15"), 60, created).unwrap();
        tick.commit().unwrap();

        let log = db.get_today(date("2025-01-15"), later).expect("get today");
        assert_eq!(log.total_active_secs, 60);
        assert_eq!(log.last_update, created);
    }

    #[test]
    fn tick_accrual_round_trip() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let t0 = ts("2025-01-15T10:00:00Z");
        let t1 = ts("2025-01-15T10:01:00Z");

        let tick = db.tick().expect("tick");
        tick.get_or_create(date("2025-01-15"), t0).unwrap();
        tick.upsert(date("2025-01-15"), 60, t1).unwrap();
        tick.commit().unwrap();

        let log = db
            .get_log(date("2025-01-15"))
            .expect("get log")
            .expect("row exists");
        assert_eq!(log.total_active_secs, 60);
        assert_eq!(log.last_update, t1);
    }

    #[test]
    fn upsert_rejects_decreasing_total() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let now = ts("2025-01-15T10:00:00Z");

        let tick = db.tick().expect("tick");
        tick.get_or_create(date("2025-01-15"), now).unwrap();
        tick.upsert(date("2025-01-15"), 120, now).unwrap();
        tick.commit().unwrap();

        let tick = db.tick().expect("tick");
        let result = tick.upsert(date("2025-01-15"), 60, now);
        assert!(matches!(
            result,
            Err(DbError::DecreasingTotal {
                stored: 120,
                attempted: 60,
                ..
            })
        ));
    }

    #[test]
    fn upsert_allows_equal_total_advancing_last_update() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let t0 = ts("2025-01-15T10:00:00Z");
        let t1 = ts("2025-01-15T10:01:00Z");

        let tick = db.tick().expect("tick");
        tick.get_or_create(date("2025-01-15"), t0).unwrap();
        tick.upsert(date("2025-01-15"), 0, t1).unwrap();
        tick.commit().unwrap();

        let log = db.get_log(date("2025-01-15")).unwrap().unwrap();
        assert_eq!(log.total_active_secs, 0);
        assert_eq!(log.last_update, t1);
    }

    #[test]
    fn day_rollover_leaves_previous_row_unchanged() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let yesterday_ts = ts("2025-01-15T23:59:00Z");
        let midnight = ts("2025-01-16T00:00:30Z");

        let tick = db.tick().expect("tick");
        tick.get_or_create(date("2025-01-15"), yesterday_ts).unwrap();
        tick.upsert(date("2025-01-15"), 28_800, yesterday_ts).unwrap();
        tick.commit().unwrap();

        let fresh = db.get_today(date("2025-01-16"), midnight).unwrap();
        assert_eq!(fresh.total_active_secs, 0);
        assert_eq!(fresh.last_update, midnight);

        let previous = db.get_log(date("2025-01-15")).unwrap().unwrap();
        assert_eq!(previous.total_active_secs, 28_800);
        assert_eq!(previous.last_update, yesterday_ts);
    }

    #[test]
    fn dropped_tick_transaction_rolls_back() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let now = ts("2025-01-15T10:00:00Z");

        {
            let tick = db.tick().expect("tick");
            tick.get_or_create(date("2025-01-15"), now).unwrap();
            tick.upsert(date("2025-01-15"), 60, now).unwrap();
            // No commit.
        }

        assert!(db.get_log(date("2025-01-15")).unwrap().is_none());
    }

    #[test]
    fn totals_persist_across_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wt.db");
        let now = ts("2025-01-15T10:00:00Z");

        {
            let mut db = Database::open(&path).expect("open db");
            let tick = db.tick().unwrap();
            tick.get_or_create(date("2025-01-15"), now).unwrap();
            tick.upsert(date("2025-01-15"), 60, now).unwrap();
            tick.commit().unwrap();
        }

        let db = Database::open(&path).expect("reopen db");
        let log = db.get_log(date("2025-01-15")).unwrap().unwrap();
        assert_eq!(log.total_active_secs, 60);
    }

    #[test]
    fn get_log_returns_none_for_missing_date() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert!(db.get_log(date("2020-06-01")).unwrap().is_none());
    }

    #[test]
    fn recent_logs_orders_newest_first_and_limits() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        for (day, total) in [("2025-01-13", 100), ("2025-01-15", 300), ("2025-01-14", 200)] {
            let now = ts(&format!("{day}T12:00:00Z"));
            let tick = db.tick().unwrap();
            tick.get_or_create(date(day), now).unwrap();
            tick.upsert(date(day), total, now).unwrap();
            tick.commit().unwrap();
        }

        let logs = db.recent_logs(2).expect("recent logs");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].date, date("2025-01-15"));
        assert_eq!(logs[0].total_active_secs, 300);
        assert_eq!(logs[1].date, date("2025-01-14"));
    }
}
