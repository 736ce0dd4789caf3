//! Core domain logic for the work tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Accrual: turning idle samples into a bounded per-day active total
//! - Idle sampling: the capability contract for session-manager queries
//! - Status: the read-only snapshot shared by the CLI and the publisher

pub mod accrual;
pub mod idle;
pub mod status;

pub use accrual::{
    AccrualPolicy, Activity, DailyLog, PolicyError, TickOutcome, apply_tick, classify,
};
pub use idle::{IdleSample, IdleSource, IdleSourceError};
pub use status::{StatusSnapshot, format_hours_minutes};
