//! Tick command: sample session state and accrue active time.
//!
//! One invocation performs at most one store read and one store write, then
//! exits; repeated and overlapping invocations serialize on the store's
//! tick transaction.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};

use wt_core::{AccrualPolicy, Activity, IdleSource, TickOutcome, apply_tick, classify};
use wt_db::Database;

/// Runs one accrual tick against the current wall clock.
pub fn run<S: IdleSource>(
    db: &mut Database,
    source: &S,
    policy: &AccrualPolicy,
) -> Result<TickOutcome> {
    run_at(db, source, policy, Local::now().date_naive(), Utc::now())
}

/// Runs one accrual tick at an explicit date and time.
pub(crate) fn run_at<S: IdleSource>(
    db: &mut Database,
    source: &S,
    policy: &AccrualPolicy,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TickOutcome> {
    let activity = sample_activity(source, policy);
    let tick = db.tick().context("failed to start tick transaction")?;
    let log = tick.get_or_create(today, now)?;
    let outcome = apply_tick(&log, activity, now, policy);
    tick.upsert(today, outcome.new_total_secs, now)?;
    tick.commit()?;
    tracing::info!(
        status = outcome.activity.label(),
        elapsed_secs = outcome.elapsed_secs,
        total_secs = outcome.new_total_secs,
        "tick recorded"
    );
    Ok(outcome)
}

/// Classifies the live sample; a failed query degrades to an idle tick.
pub(crate) fn sample_activity<S: IdleSource>(source: &S, policy: &AccrualPolicy) -> Activity {
    match source.query_idle() {
        Ok(sample) => classify(&sample, policy),
        Err(err) => {
            tracing::warn!(error = %err, "idle query failed, treating tick as idle");
            Activity::Idle
        }
    }
}
