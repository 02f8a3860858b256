//! Downtime breakdown for human-readable reports.
//!
//! Pure integer arithmetic: every unit is a floor division of the one below
//! it, and minutes and seconds wrap at 60.

use std::fmt;

use serde::Serialize;

pub const SECONDS_PER_MINUTE: u64 = 60;
pub const MINUTES_PER_HOUR: u64 = 60;
pub const HOURS_PER_DAY: u64 = 24;
pub const DAYS_PER_WEEK: u64 = 7;

/// An elapsed time split into weeks, days, hours, minutes and seconds.
///
/// Every field except `weeks` is below its unit bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DowntimeBreakdown {
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

/// Split `total_seconds` into its calendar-free breakdown.
pub fn normalize(total_seconds: u64) -> DowntimeBreakdown {
    let seconds = total_seconds % SECONDS_PER_MINUTE;
    let total_minutes = total_seconds / SECONDS_PER_MINUTE;

    let minutes = total_minutes % MINUTES_PER_HOUR;
    let total_hours = total_minutes / MINUTES_PER_HOUR;

    let hours = total_hours % HOURS_PER_DAY;
    let total_days = total_hours / HOURS_PER_DAY;

    let days = total_days % DAYS_PER_WEEK;
    let weeks = total_days / DAYS_PER_WEEK;

    DowntimeBreakdown {
        weeks,
        days,
        hours,
        minutes,
        seconds,
    }
}

impl DowntimeBreakdown {
    /// Recombine the breakdown into seconds.
    pub fn total_seconds(&self) -> u64 {
        let day = HOURS_PER_DAY * MINUTES_PER_HOUR * SECONDS_PER_MINUTE;
        self.weeks * DAYS_PER_WEEK * day
            + self.days * day
            + self.hours * MINUTES_PER_HOUR * SECONDS_PER_MINUTE
            + self.minutes * SECONDS_PER_MINUTE
            + self.seconds
    }
}

impl fmt::Display for DowntimeBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} week(s), {} day(s), {} hour(s), {} minute(s) and {} second",
            self.weeks, self.days, self.hours, self.minutes, self.seconds
        )
    }
}
