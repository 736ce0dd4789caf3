//! Published payload format.

use chrono::Local;
use serde::{Deserialize, Serialize};

use wt_core::StatusSnapshot;

/// The retained status message, as consumers see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Current day's active total in seconds.
    pub total_time: i64,
    /// Status label, `active` or `idle`.
    pub status: String,
    /// Local time of the last accrual write, `HH:MM`.
    pub last_update: String,
}

impl From<&StatusSnapshot> for StatusPayload {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            total_time: snapshot.total_active_secs,
            status: snapshot.activity.label().to_string(),
            last_update: snapshot
                .last_update
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string(),
        }
    }
}
