use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;
use chrono::{DateTime, Utc};

/// Create a new scheduled scan
pub async fn create_scheduled_scan(pool: &DbPool, new_scan: &NewScheduledScan) -> Result<ScheduledScan> {
    let now = utils::now();

    let scan = sqlx::query_as::<_, ScheduledScan>(
        r#"
        INSERT INTO scheduled_scans (
            user_id, website_url, frequency_days, next_scan_at, is_active,
            email_alerts, auto_optimize, failure_count, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, 1, ?, ?, 0, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new_scan.user_id)
    .bind(&new_scan.website_url)
    .bind(new_scan.frequency_days)
    .bind(new_scan.next_scan_at)
    .bind(new_scan.email_alerts)
    .bind(new_scan.auto_optimize)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(scan)
}

/// Get scheduled scan by ID
pub async fn get_scheduled_scan(pool: &DbPool, scan_id: i64) -> Result<ScheduledScan> {
    sqlx::query_as::<_, ScheduledScan>("SELECT * FROM scheduled_scans WHERE id = ?")
        .bind(scan_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Scheduled scan {scan_id} not found")))
}

/// Get a scheduled scan owned by the user
pub async fn get_scheduled_scan_for_user(
    pool: &DbPool,
    user_id: &str,
    scan_id: i64,
) -> Result<ScheduledScan> {
    sqlx::query_as::<_, ScheduledScan>(
        "SELECT * FROM scheduled_scans WHERE id = ? AND user_id = ?",
    )
    .bind(scan_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Scheduled scan {scan_id} not found")))
}

/// List a user's scheduled scans
pub async fn list_scheduled_scans(pool: &DbPool, user_id: &str) -> Result<Vec<ScheduledScan>> {
    let scans = sqlx::query_as::<_, ScheduledScan>(
        "SELECT * FROM scheduled_scans WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(scans)
}

/// List every active scan whose next run is at or before `now`.
/// No ORDER BY: rows come back in the store's natural order.
pub async fn list_due_scans(pool: &DbPool, now: DateTime<Utc>) -> Result<Vec<ScheduledScan>> {
    let scans = sqlx::query_as::<_, ScheduledScan>(
        "SELECT * FROM scheduled_scans WHERE is_active = 1 AND next_scan_at <= ?",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(scans)
}

/// Apply a partial update to a user's scheduled scan
pub async fn update_scheduled_scan(
    pool: &DbPool,
    user_id: &str,
    scan_id: i64,
    update: &UpdateScheduledScan,
) -> Result<ScheduledScan> {
    let existing = get_scheduled_scan_for_user(pool, user_id, scan_id).await?;

    let frequency_days = update.frequency_days.unwrap_or(existing.frequency_days);
    let is_active = update.is_active.unwrap_or(existing.is_active);
    let email_alerts = update.email_alerts.unwrap_or(existing.email_alerts);
    let auto_optimize = update.auto_optimize.unwrap_or(existing.auto_optimize);

    // Reactivating clears the failure streak left by automatic deactivation
    let failure_count = if is_active && !existing.is_active {
        0
    } else {
        existing.failure_count
    };

    let scan = sqlx::query_as::<_, ScheduledScan>(
        r#"
        UPDATE scheduled_scans
        SET frequency_days = ?, is_active = ?, email_alerts = ?, auto_optimize = ?,
            failure_count = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        RETURNING *
        "#,
    )
    .bind(frequency_days)
    .bind(is_active)
    .bind(email_alerts)
    .bind(auto_optimize)
    .bind(failure_count)
    .bind(utils::now())
    .bind(scan_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(scan)
}

/// Delete a user's scheduled scan
pub async fn delete_scheduled_scan(pool: &DbPool, user_id: &str, scan_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM scheduled_scans WHERE id = ? AND user_id = ?")
        .bind(scan_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Scheduled scan {scan_id} not found")));
    }

    Ok(())
}

/// Try to take the lease on a due row.
///
/// Succeeds only if the row is still active, still due, and not held by an
/// unexpired lease. Returns false when another run owns it.
pub async fn claim_scan(
    pool: &DbPool,
    scan_id: i64,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE scheduled_scans
        SET claimed_until = ?
        WHERE id = ?
          AND is_active = 1
          AND next_scan_at <= ?
          AND (claimed_until IS NULL OR claimed_until <= ?)
        "#,
    )
    .bind(lease_until)
    .bind(scan_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a successful run: advance the schedule and drop the lease
pub async fn complete_run(
    pool: &DbPool,
    scan_id: i64,
    last_scan_at: DateTime<Utc>,
    next_scan_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scheduled_scans
        SET last_scan_at = ?, next_scan_at = ?, failure_count = 0, last_error = NULL,
            claimed_until = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(last_scan_at)
    .bind(next_scan_at)
    .bind(last_scan_at)
    .bind(scan_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a failed run: bump the failure streak, push the next attempt out,
/// optionally deactivate, and drop the lease
pub async fn record_failure(
    pool: &DbPool,
    scan_id: i64,
    now: DateTime<Utc>,
    next_scan_at: DateTime<Utc>,
    error_message: &str,
    deactivate: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE scheduled_scans
        SET failure_count = failure_count + 1, last_error = ?, next_scan_at = ?,
            is_active = CASE WHEN ? THEN 0 ELSE is_active END,
            claimed_until = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(error_message)
    .bind(next_scan_at)
    .bind(deactivate)
    .bind(now)
    .bind(scan_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Count active scheduled scans
pub async fn count_active(pool: &DbPool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM scheduled_scans WHERE is_active = 1")
        .fetch_one(pool)
        .await?;

    Ok(count)
}
