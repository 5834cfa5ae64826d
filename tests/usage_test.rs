mod common;

use chrono::Duration;
use common::*;
use seowatch::db::{self, models::NewScanResult};
use seowatch::usage::{UsageKind, UsageTracker};
use seowatch::{utils, Error};

#[tokio::test]
async fn test_summary_for_new_user() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "new@example.com", "free").await;
    let tracker = UsageTracker::new(pool.clone());
    let now = utils::now();

    let summary = tracker.summary(&user.id, now).await.unwrap();
    assert_eq!(summary.plan, "free");
    assert_eq!(summary.limits.scans, 10);
    assert_eq!(summary.limits.optimizations, 2);
    assert_eq!(summary.limits.ai_rewrites, 5);
    assert_eq!(summary.scans_used, 0);
    assert_eq!(summary.reset_date, utils::next_month_start(now));
    assert_eq!(summary.this_month.scans, 0);
}

#[tokio::test]
async fn test_increment_adds_exactly_one() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "inc@example.com", "pro").await;
    let tracker = UsageTracker::new(pool.clone());
    let now = utils::now();

    let counters = tracker
        .increment(&user.id, UsageKind::Scans, now)
        .await
        .unwrap();
    assert_eq!(counters.scans_used, 1);

    let counters = tracker
        .increment(&user.id, UsageKind::AiRewrites, now)
        .await
        .unwrap();
    assert_eq!(counters.scans_used, 1);
    assert_eq!(counters.ai_rewrites_used, 1);
    assert_eq!(counters.optimizations_used, 0);
}

#[tokio::test]
async fn test_quota_is_enforced_per_kind() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "quota@example.com", "free").await;
    let tracker = UsageTracker::new(pool.clone());
    let now = utils::now();

    for _ in 0..2 {
        tracker
            .ensure_within_limit(&user.id, UsageKind::Optimizations, now)
            .await
            .unwrap();
        tracker
            .increment(&user.id, UsageKind::Optimizations, now)
            .await
            .unwrap();
    }

    let err = tracker
        .ensure_within_limit(&user.id, UsageKind::Optimizations, now)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded(_)));

    // A failed check does not move the counter
    let summary = tracker.summary(&user.id, now).await.unwrap();
    assert_eq!(summary.optimizations_used, 2);

    tracker
        .ensure_within_limit(&user.id, UsageKind::Scans, now)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unlimited_plan_never_hits_quota() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "big@example.com", "enterprise").await;
    let tracker = UsageTracker::new(pool.clone());
    let now = utils::now();

    for _ in 0..5 {
        tracker
            .increment(&user.id, UsageKind::AiRewrites, now)
            .await
            .unwrap();
    }

    tracker
        .ensure_within_limit(&user.id, UsageKind::AiRewrites, now)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_counters_reset_after_reset_date() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "reset@example.com", "free").await;
    let tracker = UsageTracker::new(pool.clone());
    let now = utils::now();

    for _ in 0..3 {
        tracker
            .increment(&user.id, UsageKind::Scans, now)
            .await
            .unwrap();
    }

    let next_month = utils::next_month_start(now) + Duration::days(1);
    let summary = tracker.summary(&user.id, next_month).await.unwrap();
    assert_eq!(summary.scans_used, 0);
    assert_eq!(summary.reset_date, utils::next_month_start(next_month));
}

#[tokio::test]
async fn test_monthly_activity_counts_stored_results() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "activity@example.com", "free").await;
    let tracker = UsageTracker::new(pool.clone());

    db::results::insert_result(
        &pool,
        &NewScanResult {
            user_id: user.id.clone(),
            website_url: "https://a.com/".to_string(),
            seo_score: 88,
            issues: vec![],
        },
    )
    .await
    .unwrap();

    let summary = tracker.summary(&user.id, utils::now()).await.unwrap();
    assert_eq!(summary.this_month.scans, 1);
    assert_eq!(summary.this_month.optimizations, 0);
}

#[tokio::test]
async fn test_failed_increment_leaves_counter_unchanged() {
    let pool = pool_with_plans().await;
    let user = create_profile(&pool, "flaky@example.com", "pro").await;
    let tracker = UsageTracker::new(pool.clone());
    let now = utils::now();

    tracker
        .increment(&user.id, UsageKind::Optimizations, now)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TRIGGER reject_usage BEFORE UPDATE ON usage_counters \
         BEGIN SELECT RAISE(ABORT, 'usage store offline'); END",
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = tracker
        .increment(&user.id, UsageKind::Optimizations, now)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Database(_)));

    sqlx::query("DROP TRIGGER reject_usage")
        .execute(&pool)
        .await
        .unwrap();

    let summary = tracker.summary(&user.id, now).await.unwrap();
    assert_eq!(summary.optimizations_used, 1);
}

#[tokio::test]
async fn test_increment_for_unknown_profile_is_rejected() {
    let pool = pool_with_plans().await;
    let tracker = UsageTracker::new(pool.clone());

    assert!(tracker
        .increment("no-such-profile", UsageKind::Scans, utils::now())
        .await
        .is_err());

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_counters")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}
