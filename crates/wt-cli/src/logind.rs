//! systemd-logind idle source.
//!
//! Samples session idleness from `loginctl show-session`, which exposes
//! `IdleHint`/`IdleSinceHint` (input recency) and `LockedHint` (lock state)
//! for the calling session.

use std::process::Command;
use std::time::Duration;

use chrono::{DateTime, Utc};

use wt_core::{IdleSample, IdleSource, IdleSourceError};

const PROPERTIES: [&str; 3] = ["IdleHint", "IdleSinceHint", "LockedHint"];

/// Queries the session manager via `loginctl`.
#[derive(Debug, Clone)]
pub struct LogindIdleSource {
    session: String,
}

impl LogindIdleSource {
    /// Targets the caller's own session.
    pub fn new() -> Self {
        Self {
            session: "auto".to_string(),
        }
    }
}

impl Default for LogindIdleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSource for LogindIdleSource {
    fn query_idle(&self) -> Result<IdleSample, IdleSourceError> {
        let output = Command::new("loginctl")
            .arg("show-session")
            .arg(&self.session)
            .args(PROPERTIES.iter().map(|p| format!("--property={p}")))
            .output()?;
        if !output.status.success() {
            return Err(IdleSourceError::Query(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_session_state(&String::from_utf8_lossy(&output.stdout), Utc::now())
    }
}

/// Parses `Key=value` lines from `loginctl show-session`.
fn parse_session_state(raw: &str, now: DateTime<Utc>) -> Result<IdleSample, IdleSourceError> {
    let mut idle_hint = None;
    let mut idle_since_usec = None;
    let mut locked = false;

    for line in raw.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "IdleHint" => idle_hint = Some(parse_bool(value)?),
            "IdleSinceHint" => idle_since_usec = Some(parse_usec(value)?),
            "LockedHint" => locked = parse_bool(value)?,
            _ => {}
        }
    }

    let idle_hint =
        idle_hint.ok_or_else(|| IdleSourceError::Parse("missing IdleHint".to_string()))?;
    let idle_time = if idle_hint {
        idle_since(idle_since_usec, now)
    } else {
        Duration::ZERO
    };
    Ok(IdleSample { idle_time, locked })
}

fn parse_bool(value: &str) -> Result<bool, IdleSourceError> {
    match value.trim() {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(IdleSourceError::Parse(format!(
            "expected yes/no, got {other:?}"
        ))),
    }
}

fn parse_usec(value: &str) -> Result<i64, IdleSourceError> {
    value
        .trim()
        .parse()
        .map_err(|_| IdleSourceError::Parse(format!("bad usec timestamp {value:?}")))
}

/// Idle duration from the hint timestamp; a missing or zero hint while idle
/// reads as "just went idle".
fn idle_since(usec: Option<i64>, now: DateTime<Utc>) -> Duration {
    let Some(usec) = usec.filter(|&u| u > 0) else {
        return Duration::ZERO;
    };
    let secs = now.timestamp_micros().saturating_sub(usec) / 1_000_000;
    u64::try_from(secs).map_or(Duration::ZERO, Duration::from_secs)
}
