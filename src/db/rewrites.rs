use crate::db::{models::*, DbPool};
use crate::error::Result;
use crate::utils;
use chrono::{DateTime, Utc};

/// Record that an AI rewrite was performed
pub async fn insert_rewrite(
    pool: &DbPool,
    user_id: &str,
    original_length: i64,
    rewritten_length: i64,
) -> Result<AiRewrite> {
    let row = sqlx::query_as::<_, AiRewrite>(
        r#"
        INSERT INTO ai_rewrites (user_id, original_length, rewritten_length, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(original_length)
    .bind(rewritten_length)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn count_rewrites_since(
    pool: &DbPool,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ai_rewrites WHERE user_id = ? AND created_at >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
