use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;
use chrono::{DateTime, Duration, Utc};

/// Create an API token record
pub async fn create_token(pool: &DbPool, new_token: &NewApiToken) -> Result<ApiToken> {
    let token = sqlx::query_as::<_, ApiToken>(
        r#"
        INSERT INTO api_tokens (user_id, name, token_hash, token_prefix, rate_limit_per_hour, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new_token.user_id)
    .bind(&new_token.name)
    .bind(&new_token.token_hash)
    .bind(&new_token.token_prefix)
    .bind(new_token.rate_limit_per_hour)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(token)
}

/// Find a non-revoked token by hash
pub async fn find_active_token(pool: &DbPool, token_hash: &str) -> Result<Option<ApiToken>> {
    let token = sqlx::query_as::<_, ApiToken>(
        "SELECT * FROM api_tokens WHERE token_hash = ? AND revoked_at IS NULL",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(token)
}

/// List a user's tokens, newest first
pub async fn list_tokens(pool: &DbPool, user_id: &str) -> Result<Vec<ApiToken>> {
    let tokens = sqlx::query_as::<_, ApiToken>(
        "SELECT * FROM api_tokens WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(tokens)
}

/// Revoke one of the user's tokens
pub async fn revoke_token(pool: &DbPool, user_id: &str, token_id: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE api_tokens SET revoked_at = ? WHERE id = ? AND user_id = ? AND revoked_at IS NULL",
    )
    .bind(utils::now())
    .bind(token_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("API token {token_id} not found")));
    }

    Ok(())
}

/// Sliding one-hour window rate limit for a token.
///
/// The window count and the insert of this request are one statement, so
/// concurrent requests on a token serialize on SQLite's write lock instead
/// of racing a read-then-write transaction. Returns whether the request is
/// allowed.
pub async fn check_rate_limit(
    pool: &DbPool,
    token_id: i64,
    limit: i64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let window_start = now - Duration::hours(1);

    let recorded = sqlx::query(
        r#"
        INSERT INTO api_token_requests (token_id, requested_at)
        SELECT ?, ?
        WHERE (
            SELECT COUNT(*) FROM api_token_requests
            WHERE token_id = ? AND requested_at > ?
        ) < ?
        "#,
    )
    .bind(token_id)
    .bind(now)
    .bind(token_id)
    .bind(window_start)
    .bind(limit)
    .execute(pool)
    .await?;

    if recorded.rows_affected() != 1 {
        return Ok(false);
    }

    sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE id = ?")
        .bind(now)
        .bind(token_id)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM api_token_requests WHERE token_id = ? AND requested_at <= ?")
        .bind(token_id)
        .bind(window_start)
        .execute(pool)
        .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, init_pool, profiles, run_migrations};

    async fn setup() -> (DbPool, ApiToken) {
        let pool = init_memory_pool().await.unwrap();
        let token = seed_token(&pool, 2).await;
        (pool, token)
    }

    async fn seed_token(pool: &DbPool, rate_limit_per_hour: i64) -> ApiToken {
        let profile = profiles::create_profile(
            pool,
            &NewProfile {
                email: "t@example.com".into(),
                role: ROLE_MEMBER.into(),
                plan: "free".into(),
            },
        )
        .await
        .unwrap();

        create_token(
            pool,
            &NewApiToken {
                user_id: profile.id.clone(),
                name: "ci".into(),
                token_hash: "hash".into(),
                token_prefix: "swk_12345678".into(),
                rate_limit_per_hour,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_window() {
        let (pool, token) = setup().await;
        let now = utils::now();

        assert!(check_rate_limit(&pool, token.id, 2, now).await.unwrap());
        assert!(check_rate_limit(&pool, token.id, 2, now).await.unwrap());
        assert!(!check_rate_limit(&pool, token.id, 2, now).await.unwrap());

        // An hour later the window has moved on
        let later = now + Duration::hours(1) + Duration::seconds(1);
        assert!(check_rate_limit(&pool, token.id, 2, later).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_requests_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}/tokens.db", dir.path().display());
        let pool = init_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let token = seed_token(&pool, 10).await;
        let now = utils::now();

        let outcomes = futures::future::join_all(
            (0..40).map(|_| check_rate_limit(&pool, token.id, 10, now)),
        )
        .await;

        let mut allowed = 0;
        for outcome in outcomes {
            // Contention must resolve to allow or deny, never a store error
            if outcome.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 10);

        let recorded: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM api_token_requests WHERE token_id = ?")
                .bind(token.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(recorded, 10);
    }

    #[tokio::test]
    async fn test_revoked_token_is_not_found() {
        let (pool, token) = setup().await;

        assert!(find_active_token(&pool, "hash").await.unwrap().is_some());
        revoke_token(&pool, &token.user_id, token.id).await.unwrap();
        assert!(find_active_token(&pool, "hash").await.unwrap().is_none());

        // Revoking twice reports not found
        assert!(revoke_token(&pool, &token.user_id, token.id).await.is_err());
        assert_eq!(list_tokens(&pool, &token.user_id).await.unwrap().len(), 1);
    }
}
