use crate::db::{comparisons, models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Executor, Sqlite};

/// Append a scan result
pub async fn insert_result<'c, E>(executor: E, new_result: &NewScanResult) -> Result<ScanResult>
where
    E: Executor<'c, Database = Sqlite>,
{
    let result = sqlx::query_as::<_, ScanResult>(
        r#"
        INSERT INTO scan_results (user_id, website_url, seo_score, issues, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&new_result.user_id)
    .bind(&new_result.website_url)
    .bind(new_result.seo_score)
    .bind(Json(&new_result.issues))
    .bind(utils::now())
    .fetch_one(executor)
    .await?;

    Ok(result)
}

/// Store a rescan's result and its comparison together.
///
/// Either both rows land or neither does, so a failed comparison never
/// leaves a result behind to be mistaken for the previous scan on retry.
pub async fn insert_result_with_comparison(
    pool: &DbPool,
    new_result: &NewScanResult,
    comparison: &NewScanComparison,
) -> Result<(ScanResult, ScanComparison)> {
    let mut tx = pool.begin().await?;

    let result = insert_result(&mut *tx, new_result).await?;
    let comparison = comparisons::insert_comparison(&mut *tx, comparison).await?;

    tx.commit().await?;
    Ok((result, comparison))
}

/// Most recent result for a user's URL, if any
pub async fn latest_result(
    pool: &DbPool,
    user_id: &str,
    website_url: &str,
) -> Result<Option<ScanResult>> {
    let result = sqlx::query_as::<_, ScanResult>(
        r#"
        SELECT * FROM scan_results
        WHERE user_id = ? AND website_url = ?
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(website_url)
    .fetch_optional(pool)
    .await?;

    Ok(result)
}

/// Get one of the user's results
pub async fn get_result(pool: &DbPool, user_id: &str, result_id: i64) -> Result<ScanResult> {
    sqlx::query_as::<_, ScanResult>("SELECT * FROM scan_results WHERE id = ? AND user_id = ?")
        .bind(result_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Scan result {result_id} not found")))
}

/// List the user's results newest first, optionally for one URL
pub async fn list_results(
    pool: &DbPool,
    user_id: &str,
    website_url: Option<&str>,
    limit: i64,
) -> Result<Vec<ScanResult>> {
    let results = sqlx::query_as::<_, ScanResult>(
        r#"
        SELECT * FROM scan_results
        WHERE user_id = ? AND (? IS NULL OR website_url = ?)
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(website_url)
    .bind(website_url)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(results)
}

/// Count results created at or after `since`
pub async fn count_results_since(
    pool: &DbPool,
    user_id: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scan_results WHERE user_id = ? AND created_at >= ?",
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
    use crate::analyzer::{SeoIssue, Severity};
    use crate::db::{init_memory_pool, profiles};

    async fn setup() -> (DbPool, String) {
        let pool = init_memory_pool().await.unwrap();
        let profile = profiles::create_profile(
            &pool,
            &NewProfile {
                email: "results@example.com".into(),
                role: ROLE_MEMBER.into(),
                plan: "free".into(),
            },
        )
        .await
        .unwrap();
        (pool, profile.id)
    }

    fn new_result(user_id: &str, url: &str, score: i64) -> NewScanResult {
        NewScanResult {
            user_id: user_id.to_string(),
            website_url: url.to_string(),
            seo_score: score,
            issues: vec![SeoIssue {
                code: "h1_missing".into(),
                severity: Severity::Error,
                message: "No H1".into(),
                points_lost: 10,
            }],
        }
    }

    #[tokio::test]
    async fn test_latest_result_prefers_newest() {
        let (pool, user_id) = setup().await;

        assert!(latest_result(&pool, &user_id, "https://a.com/")
            .await
            .unwrap()
            .is_none());

        insert_result(&pool, &new_result(&user_id, "https://a.com/", 60))
            .await
            .unwrap();
        insert_result(&pool, &new_result(&user_id, "https://a.com/", 75))
            .await
            .unwrap();
        insert_result(&pool, &new_result(&user_id, "https://b.com/", 10))
            .await
            .unwrap();

        let latest = latest_result(&pool, &user_id, "https://a.com/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.seo_score, 75);
        assert_eq!(latest.issues.0[0].code, "h1_missing");
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let (pool, user_id) = setup().await;
        let start = utils::now();

        for score in [50, 60, 70] {
            insert_result(&pool, &new_result(&user_id, "https://a.com/", score))
                .await
                .unwrap();
        }
        insert_result(&pool, &new_result(&user_id, "https://b.com/", 10))
            .await
            .unwrap();

        assert_eq!(list_results(&pool, &user_id, None, 50).await.unwrap().len(), 4);
        assert_eq!(
            list_results(&pool, &user_id, Some("https://a.com/"), 2)
                .await
                .unwrap()
                .len(),
            2
        );
        assert_eq!(count_results_since(&pool, &user_id, start).await.unwrap(), 4);
        assert!(get_result(&pool, "other", 1).await.is_err());
    }
}
