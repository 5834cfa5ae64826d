use crate::db::{models::*, DbPool};
use crate::error::Result;
use crate::usage::UsageKind;
use crate::utils;
use chrono::{DateTime, Utc};

/// Fetch the user's counters, creating a zeroed row on first use
pub async fn get_or_create_counters(
    pool: &DbPool,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<UsageCounters> {
    sqlx::query(
        r#"
        INSERT INTO usage_counters (user_id, scans_used, optimizations_used, ai_rewrites_used, reset_date)
        VALUES (?, 0, 0, 0, ?)
        ON CONFLICT(user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(utils::next_month_start(now))
    .execute(pool)
    .await?;

    let counters =
        sqlx::query_as::<_, UsageCounters>("SELECT * FROM usage_counters WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(counters)
}

/// Zero the counters if the reset date has passed and move the reset date
/// to the start of next month. Single conditional UPDATE; returns whether a
/// reset happened.
pub async fn reset_if_due(pool: &DbPool, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE usage_counters
        SET scans_used = 0, optimizations_used = 0, ai_rewrites_used = 0, reset_date = ?
        WHERE user_id = ? AND reset_date <= ?
        "#,
    )
    .bind(utils::next_month_start(now))
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically add one to a counter, creating the row if needed
pub async fn increment_counter(
    pool: &DbPool,
    user_id: &str,
    kind: UsageKind,
    now: DateTime<Utc>,
) -> Result<UsageCounters> {
    // Column names come from a closed enum, never from input
    let column = kind.column();
    let sql = format!(
        r#"
        INSERT INTO usage_counters (user_id, {column}, reset_date)
        VALUES (?, 1, ?)
        ON CONFLICT(user_id) DO UPDATE SET {column} = {column} + 1
        RETURNING *
        "#
    );

    let counters = sqlx::query_as::<_, UsageCounters>(&sql)
        .bind(user_id)
        .bind(utils::next_month_start(now))
        .fetch_one(pool)
        .await?;

    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, profiles};
    use chrono::{Duration, TimeZone};

    async fn setup() -> (DbPool, String) {
        let pool = init_memory_pool().await.unwrap();
        let profile = profiles::create_profile(
            &pool,
            &NewProfile {
                email: "usage@example.com".into(),
                role: ROLE_MEMBER.into(),
                plan: "free".into(),
            },
        )
        .await
        .unwrap();
        (pool, profile.id)
    }

    #[tokio::test]
    async fn test_increment_creates_and_bumps() {
        let (pool, user_id) = setup().await;
        let now = utils::now();

        let first = increment_counter(&pool, &user_id, UsageKind::Scans, now)
            .await
            .unwrap();
        assert_eq!(first.scans_used, 1);
        assert_eq!(first.optimizations_used, 0);

        let second = increment_counter(&pool, &user_id, UsageKind::Scans, now)
            .await
            .unwrap();
        assert_eq!(second.scans_used, 2);

        let rewrites = increment_counter(&pool, &user_id, UsageKind::AiRewrites, now)
            .await
            .unwrap();
        assert_eq!(rewrites.scans_used, 2);
        assert_eq!(rewrites.ai_rewrites_used, 1);
    }

    #[tokio::test]
    async fn test_reset_when_due() {
        let (pool, user_id) = setup().await;
        let january = Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap();

        increment_counter(&pool, &user_id, UsageKind::Optimizations, january)
            .await
            .unwrap();

        // Still January: nothing to reset
        assert!(!reset_if_due(&pool, &user_id, january + Duration::days(1))
            .await
            .unwrap());

        let february = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        assert!(reset_if_due(&pool, &user_id, february).await.unwrap());

        let counters = get_or_create_counters(&pool, &user_id, february)
            .await
            .unwrap();
        assert_eq!(counters.optimizations_used, 0);
        assert_eq!(
            counters.reset_date,
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
