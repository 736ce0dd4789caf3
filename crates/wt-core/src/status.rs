//! Read-only status snapshots.

use chrono::{DateTime, Utc};

use crate::accrual::Activity;

/// Value returned by status queries and published to consumers.
///
/// Snapshots are reads; producing one must never touch the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub activity: Activity,
    pub total_active_secs: i64,
    pub last_update: DateTime<Utc>,
}

/// Formats a seconds total as `HH:MM`.
pub fn format_hours_minutes(total_secs: i64) -> String {
    let total = total_secs.max(0);
    format!("{:02}:{:02}", total / 3600, (total % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_zero_total() {
        assert_eq!(format_hours_minutes(0), "00:00");
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_hours_minutes(3725), "01:02");
        assert_eq!(format_hours_minutes(59), "00:00");
        assert_eq!(format_hours_minutes(36_000), "10:00");
    }

    #[test]
    fn negative_totals_render_as_zero() {
        assert_eq!(format_hours_minutes(-5), "00:00");
    }
}
