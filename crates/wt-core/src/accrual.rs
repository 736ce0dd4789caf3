//! Accrual of daily active time.
//!
//! A tick is one scheduled sampling of session state, nominally once per
//! minute. The computation is a pure function of the persisted day row, the
//! live idle sample, and the wall clock; nothing is carried in memory
//! between invocations. The persisted row plus its `last_update` timestamp
//! *is* the state machine's memory.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::idle::IdleSample;

/// One row of the daily counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyLog {
    /// Local calendar date, the natural key.
    pub date: NaiveDate,
    /// Accrued active time in seconds. Never decreases for a fixed date.
    pub total_active_secs: i64,
    /// Timestamp of the most recent accrual write.
    pub last_update: DateTime<Utc>,
}

/// Policy constants for classifying and bounding a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualPolicy {
    /// Idle durations below this count the session as active.
    /// Default: 300.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u64,

    /// Upper bound on the seconds credited for a single tick gap, so a
    /// suspend or a stalled scheduler is not counted as hours of activity.
    /// Must sit above the nominal tick interval. Default: 120.
    #[serde(default = "default_max_tick_gap")]
    pub max_tick_gap_secs: u64,
}

const fn default_idle_threshold() -> u64 {
    300
}

const fn default_max_tick_gap() -> u64 {
    120
}

impl Default for AccrualPolicy {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_idle_threshold(),
            max_tick_gap_secs: default_max_tick_gap(),
        }
    }
}

/// Invalid policy values.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("idle_threshold_secs must be greater than zero")]
    ZeroIdleThreshold,
    #[error("max_tick_gap_secs must be greater than zero")]
    ZeroMaxTickGap,
}

impl AccrualPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.idle_threshold_secs == 0 {
            return Err(PolicyError::ZeroIdleThreshold);
        }
        if self.max_tick_gap_secs == 0 {
            return Err(PolicyError::ZeroMaxTickGap);
        }
        Ok(())
    }
}

/// Whether a sampled session counts toward the day's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Active,
    Idle,
}

impl Activity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
        }
    }
}

/// Classifies a live idle sample.
///
/// A locked session is idle regardless of how recent the last input was.
pub fn classify(sample: &IdleSample, policy: &AccrualPolicy) -> Activity {
    if sample.locked || sample.idle_time.as_secs() >= policy.idle_threshold_secs {
        Activity::Idle
    } else {
        Activity::Active
    }
}

/// Result of applying one tick to a day row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub activity: Activity,
    /// Clamped seconds since the previous write.
    pub elapsed_secs: i64,
    /// Total to persist for the row's date.
    pub new_total_secs: i64,
}

/// Applies one tick against the current day row.
///
/// `elapsed` is bounded to `[0, max_tick_gap_secs]`: a repeated call with an
/// unchanged clock adds nothing, and a multi-hour gap is credited at most
/// one gap's worth. An idle tick adds nothing but still yields the elapsed
/// value so the caller can advance `last_update`.
pub fn apply_tick(
    log: &DailyLog,
    activity: Activity,
    now: DateTime<Utc>,
    policy: &AccrualPolicy,
) -> TickOutcome {
    let max_gap = i64::try_from(policy.max_tick_gap_secs).unwrap_or(i64::MAX);
    let elapsed_secs = (now - log.last_update).num_seconds().clamp(0, max_gap);
    let new_total_secs = match activity {
        Activity::Active => log.total_active_secs + elapsed_secs,
        Activity::Idle => log.total_active_secs,
    };
    TickOutcome {
        activity,
        elapsed_secs,
        new_total_secs,
    }
}
