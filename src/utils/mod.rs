// Utility functions
pub mod sanitize;
pub mod tokens;
pub mod validation;

use chrono::{DateTime, Datelike, SubsecRound, TimeZone, Utc};

/// Current time truncated to whole seconds, so stored timestamps round-trip exactly
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// First instant of the month containing `at`
pub fn month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// First instant of the month after the one containing `at`
pub fn next_month_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}
