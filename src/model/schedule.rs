use serde::{Deserialize, Serialize};

/// Minutes between two check cycles unless the user picks another period.
pub const DEFAULT_PERIOD_MINUTES: u64 = 15;

/// Longest accepted period, one year.
pub const MAX_PERIOD_MINUTES: u64 = 365 * 24 * 60;

/// Singleton record describing the check schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInfo {
    /// True only while a cycle is in flight
    pub is_checking: bool,
    /// Epoch milliseconds of the last completed cycle
    pub last_check: i64,
    /// Minutes between cycles
    pub period: u64,
}

impl ScheduleInfo {
    pub fn new(now: i64) -> Self {
        Self {
            is_checking: false,
            last_check: now,
            period: DEFAULT_PERIOD_MINUTES,
        }
    }

    /// Period in milliseconds, never less than one minute.
    pub fn period_millis(&self) -> i64 {
        i64::try_from(self.period.max(1)).map_or(i64::MAX, |minutes| minutes.saturating_mul(60_000))
    }

    /// Epoch milliseconds at which the next cycle is due.
    pub fn next_due(&self) -> i64 {
        self.last_check.saturating_add(self.period_millis())
    }
}
