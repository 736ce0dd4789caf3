//! Session idle sampling.
//!
//! The tracker never watches input devices itself; it asks the host session
//! manager how long the session has been idle and whether it is locked. The
//! [`IdleSource`] trait is that capability. Samples are transient: they are
//! read fresh on every invocation and never persisted.

use std::time::Duration;

use thiserror::Error;

/// A point-in-time reading of session idleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSample {
    /// Time since the session last saw input.
    pub idle_time: Duration,
    /// Whether the session is locked.
    pub locked: bool,
}

impl IdleSample {
    /// A sample with no idle time and no lock.
    pub const fn active() -> Self {
        Self {
            idle_time: Duration::ZERO,
            locked: false,
        }
    }
}

/// Errors from querying the session manager.
#[derive(Debug, Error)]
pub enum IdleSourceError {
    /// The session manager could not be invoked at all.
    #[error("failed to invoke session manager: {0}")]
    Io(#[from] std::io::Error),
    /// The session manager ran but reported failure.
    #[error("session manager query failed: {0}")]
    Query(String),
    /// The reply could not be interpreted.
    #[error("unparseable session state: {0}")]
    Parse(String),
}

/// Source of live session idle state.
///
/// A failed query must degrade to an idle tick on the caller's side: the
/// tracker never guesses activity and never inflates the counter.
pub trait IdleSource {
    fn query_idle(&self) -> Result<IdleSample, IdleSourceError>;
}
