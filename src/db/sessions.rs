use crate::db::{models::*, DbPool};
use crate::error::Result;
use crate::utils;
use chrono::{DateTime, Utc};

/// Store a session for an already-hashed token
pub async fn create_session(
    pool: &DbPool,
    user_id: &str,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<Session> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (user_id, token_hash, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// Find an unexpired session by token hash
pub async fn find_active_session(
    pool: &DbPool,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?",
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// Remove expired sessions
pub async fn delete_expired_sessions(pool: &DbPool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
