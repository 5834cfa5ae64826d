use crate::db::{models::*, DbPool};
use crate::error::Result;
use crate::utils;
use sqlx::types::Json;
use sqlx::{Executor, Sqlite};

/// Record the difference between two consecutive scans
pub async fn insert_comparison<'c, E>(
    executor: E,
    comparison: &NewScanComparison,
) -> Result<ScanComparison>
where
    E: Executor<'c, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, ScanComparison>(
        r#"
        INSERT INTO scan_comparisons (
            user_id, website_url, scheduled_scan_id, previous_seo_score,
            current_seo_score, score_change, new_issues, fixed_issues, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&comparison.user_id)
    .bind(&comparison.website_url)
    .bind(comparison.scheduled_scan_id)
    .bind(comparison.previous_seo_score)
    .bind(comparison.current_seo_score)
    .bind(comparison.score_change())
    .bind(Json(&comparison.new_issues))
    .bind(Json(&comparison.fixed_issues))
    .bind(utils::now())
    .fetch_one(executor)
    .await?;

    Ok(row)
}

/// List the user's comparisons newest first, optionally for one URL
pub async fn list_comparisons(
    pool: &DbPool,
    user_id: &str,
    website_url: Option<&str>,
    limit: i64,
) -> Result<Vec<ScanComparison>> {
    let rows = sqlx::query_as::<_, ScanComparison>(
        r#"
        SELECT * FROM scan_comparisons
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

    Ok(rows)
}

/// Comparisons written for one scheduled scan
pub async fn list_for_scheduled_scan(
    pool: &DbPool,
    scheduled_scan_id: i64,
) -> Result<Vec<ScanComparison>> {
    let rows = sqlx::query_as::<_, ScanComparison>(
        "SELECT * FROM scan_comparisons WHERE scheduled_scan_id = ? ORDER BY id",
    )
    .bind(scheduled_scan_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, profiles};

    #[tokio::test]
    async fn test_insert_computes_score_change() {
        let pool = init_memory_pool().await.unwrap();
        let profile = profiles::create_profile(
            &pool,
            &NewProfile {
                email: "cmp@example.com".into(),
                role: ROLE_MEMBER.into(),
                plan: "free".into(),
            },
        )
        .await
        .unwrap();

        let row = insert_comparison(
            &pool,
            &NewScanComparison {
                user_id: profile.id.clone(),
                website_url: "https://a.com/".into(),
                scheduled_scan_id: None,
                previous_seo_score: 80,
                current_seo_score: 70,
                new_issues: vec!["h1_missing".into()],
                fixed_issues: vec![],
            },
        )
        .await
        .unwrap();

        assert_eq!(row.score_change, -10);
        assert_eq!(row.new_issues.0, vec!["h1_missing".to_string()]);

        let listed = list_comparisons(&pool, &profile.id, Some("https://a.com/"), 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(list_comparisons(&pool, &profile.id, Some("https://b.com/"), 10)
            .await
            .unwrap()
            .is_empty());
    }
}
