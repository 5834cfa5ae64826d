use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

/// Store an optimization run with its before/after snapshots
pub async fn insert_optimization(
    pool: &DbPool,
    record: &NewOptimizationRecord,
) -> Result<OptimizationRecord> {
    let row = sqlx::query_as::<_, OptimizationRecord>(
        r#"
        INSERT INTO optimization_history (
            user_id, website_url, trigger_source, before_metrics, after_metrics,
            changes, status, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&record.user_id)
    .bind(&record.website_url)
    .bind(&record.trigger_source)
    .bind(Json(&record.before_metrics))
    .bind(Json(&record.after_metrics))
    .bind(Json(&record.changes))
    .bind(OPTIMIZATION_COMPLETED)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_optimization(
    pool: &DbPool,
    user_id: &str,
    optimization_id: i64,
) -> Result<OptimizationRecord> {
    sqlx::query_as::<_, OptimizationRecord>(
        "SELECT * FROM optimization_history WHERE id = ? AND user_id = ?",
    )
    .bind(optimization_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Optimization {optimization_id} not found")))
}

pub async fn list_optimizations(
    pool: &DbPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<OptimizationRecord>> {
    let rows = sqlx::query_as::<_, OptimizationRecord>(
        r#"
        SELECT * FROM optimization_history
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Flip a completed optimization to rolled back.
/// Anything other than `completed` cannot be rolled back.
pub async fn rollback_optimization(
    pool: &DbPool,
    user_id: &str,
    optimization_id: i64,
) -> Result<OptimizationRecord> {
    let existing = get_optimization(pool, user_id, optimization_id).await?;
    if existing.status != OPTIMIZATION_COMPLETED {
        return Err(Error::Validation(format!(
            "Optimization {optimization_id} is {} and cannot be rolled back",
            existing.status
        )));
    }

    let row = sqlx::query_as::<_, OptimizationRecord>(
        r#"
        UPDATE optimization_history
        SET status = ?, rolled_back_at = ?
        WHERE id = ? AND user_id = ? AND status = ?
        RETURNING *
        "#,
    )
    .bind(OPTIMIZATION_ROLLED_BACK)
    .bind(utils::now())
    .bind(optimization_id)
    .bind(user_id)
    .bind(OPTIMIZATION_COMPLETED)
    .fetch_optional(pool)
    .await?
    // Lost a race with another rollback
    .ok_or_else(|| {
        Error::Validation(format!(
            "Optimization {optimization_id} cannot be rolled back"
        ))
    })?;

    Ok(row)
}

/// Count optimizations created at or after `since`
pub async fn count_optimizations_since(
    pool: &DbPool,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM optimization_history WHERE user_id = ? AND created_at >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, profiles};

    fn snapshot(score: i64) -> MetricsSnapshot {
        MetricsSnapshot {
            seo_score: score,
            issue_count: 1,
            issue_codes: vec!["meta_desc_missing".into()],
        }
    }

    #[tokio::test]
    async fn test_rollback_only_once() {
        let pool = init_memory_pool().await.unwrap();
        let profile = profiles::create_profile(
            &pool,
            &NewProfile {
                email: "opt@example.com".into(),
                role: ROLE_MEMBER.into(),
                plan: "pro".into(),
            },
        )
        .await
        .unwrap();

        let record = insert_optimization(
            &pool,
            &NewOptimizationRecord {
                user_id: profile.id.clone(),
                website_url: "https://a.com/".into(),
                trigger_source: TRIGGER_MANUAL.into(),
                before_metrics: snapshot(70),
                after_metrics: snapshot(85),
                changes: OptimizationChanges {
                    meta_description: Some("A better description".into()),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(record.status, OPTIMIZATION_COMPLETED);
        assert_eq!(record.after_metrics.0.seo_score, 85);

        let rolled = rollback_optimization(&pool, &profile.id, record.id)
            .await
            .unwrap();
        assert_eq!(rolled.status, OPTIMIZATION_ROLLED_BACK);
        assert!(rolled.rolled_back_at.is_some());

        let err = rollback_optimization(&pool, &profile.id, record.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = rollback_optimization(&pool, "someone-else", record.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        assert_eq!(list_optimizations(&pool, &profile.id, 10).await.unwrap().len(), 1);
    }
}
