// Decisions the scheduler makes after each rescan

use crate::db::models::ScheduledScan;
use chrono::Duration;
use std::collections::BTreeSet;

/// Auto-optimization runs only when the score falls by more than this
pub const AUTO_OPTIMIZE_THRESHOLD: i64 = -5;

/// Alert on any score drop or any newly detected issue
pub fn should_alert(scan: &ScheduledScan, score_change: i64, new_issue_count: usize) -> bool {
    scan.email_alerts && (score_change < 0 || new_issue_count > 0)
}

pub fn should_optimize(scan: &ScheduledScan, score_change: i64) -> bool {
    scan.auto_optimize && score_change < AUTO_OPTIMIZE_THRESHOLD
}

/// Codes present now but not before, and codes present before but not now
pub fn diff_issues(
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
) -> (Vec<String>, Vec<String>) {
    let new_issues = current.difference(previous).cloned().collect();
    let fixed_issues = previous.difference(current).cloned().collect();
    (new_issues, fixed_issues)
}

/// Delay before retrying a failed row: `retry_base × 2^(failures − 1)`,
/// never longer than the row's own frequency
pub fn failure_backoff(retry_base_minutes: i64, failure_count: i64, frequency_days: i64) -> Duration {
    let exponent = (failure_count.max(1) - 1).min(30) as u32;
    let minutes = retry_base_minutes.max(1).saturating_mul(1_i64 << exponent);
    let cap_minutes = frequency_days.max(1).saturating_mul(24 * 60);
    Duration::minutes(minutes.min(cap_minutes))
}
