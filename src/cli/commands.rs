use crate::analyzer::{Analysis, SiteAnalyzer};
use crate::config::plans::PlanConfig;
use crate::config::sync::{self, SyncReport};
use crate::db::{self, models::*, DbPool};
use crate::scheduler::CycleReport;
use crate::utils::{self, tokens, validation};
use crate::{Error, Result};
use chrono::Duration;
use std::path::Path;
use tracing::info;

/// Lifetime of a session token issued from the command line
pub const CLI_SESSION_DAYS: i64 = 30;

const CHECK: &str = "\x1b[32m\u{2713}\x1b[0m";
const CROSS: &str = "\x1b[31m\u{2717}\x1b[0m";

/// Analyze a URL and print the score and issues
pub async fn scan(analyzer: &dyn SiteAnalyzer, url: &str) -> Result<Analysis> {
    let url = validation::normalize_website_url(url)?;

    match analyzer.analyze(&url).await {
        Ok(analysis) => {
            println!("{CHECK} {url}: SEO score {}", analysis.seo_score);
            if analysis.issues.is_empty() {
                println!("  No issues found");
            } else {
                println!("  Issues:");
                for issue in &analysis.issues {
                    println!("    - [{:?}] {}: {}", issue.severity, issue.code, issue.message);
                }
            }
            Ok(analysis)
        }
        Err(e) => {
            println!("{CROSS} Scan failed: {e}");
            Err(e)
        }
    }
}

/// Print a scheduler cycle report
pub fn print_cycle_report(report: &CycleReport) {
    println!("{CHECK} Scheduler cycle complete");
    println!("  Due: {}", report.due);
    println!("  Processed: {}", report.processed);
    println!("  Skipped (leased): {}", report.skipped);
    println!("  Failed: {}", report.failed);
    println!("  Alerts sent: {}", report.alerts_sent);
    println!("  Optimizations triggered: {}", report.optimizations_triggered);
}

/// Create a profile and a session for it. Returns the plaintext session token.
pub async fn create_user(
    pool: &DbPool,
    email: &str,
    plan: &str,
    role: &str,
) -> Result<(Profile, String)> {
    validation::validate_email(email)?;
    let email = email.trim().to_lowercase();

    if role != ROLE_MEMBER && role != ROLE_ADMIN {
        return Err(Error::Validation(format!(
            "role must be {ROLE_MEMBER} or {ROLE_ADMIN}"
        )));
    }

    // Unknown plans fail here rather than on the first quota check
    db::plans::get_plan_limits(pool, plan).await?;

    if db::profiles::get_profile_by_email(pool, &email).await?.is_some() {
        return Err(Error::Validation(format!("User {email} already exists")));
    }

    let profile = db::profiles::create_profile(
        pool,
        &NewProfile {
            email,
            role: role.to_string(),
            plan: plan.to_string(),
        },
    )
    .await?;

    let token = tokens::generate_session_token();
    let expires_at = utils::now() + Duration::days(CLI_SESSION_DAYS);
    db::sessions::create_session(pool, &profile.id, &tokens::hash_token(&token), expires_at)
        .await?;

    info!("Created {} user {} on plan {}", profile.role, profile.email, profile.plan);
    Ok((profile, token))
}

/// Move the user with `email` onto `plan`
pub async fn set_plan(pool: &DbPool, email: &str, plan: &str) -> Result<Profile> {
    db::plans::get_plan_limits(pool, plan).await?;

    let profile = db::profiles::get_profile_by_email(pool, email)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No user with email {}", email.trim())))?;

    db::profiles::update_plan(pool, &profile.id, plan).await?;
    db::profiles::get_profile(pool, &profile.id).await
}

/// Load the plans file and sync it into the database
pub async fn sync_plans(pool: &DbPool, path: &Path) -> Result<SyncReport> {
    let config = PlanConfig::from_file(path)?;
    let report = sync::sync_plans_from_config(pool, &config).await?;
    report.log_summary();
    Ok(report)
}

pub fn print_sync_report(report: &SyncReport) {
    let mark = if report.errors.is_empty() { CHECK } else { CROSS };
    println!(
        "{mark} Plans synced: {} added, {} updated, {} removed, {} retained, {} unchanged",
        report.added, report.updated, report.removed, report.retained, report.unchanged
    );
    for error in &report.errors {
        println!("  - {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    async fn pool_with_plans() -> DbPool {
        let pool = init_memory_pool().await.unwrap();
        db::plans::upsert_plan_limits(&pool, "free", 10, 2, 5)
            .await
            .unwrap();
        db::plans::upsert_plan_limits(&pool, "pro", 200, 50, 100)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_user_issues_session() {
        let pool = pool_with_plans().await;

        let (profile, token) = create_user(&pool, "Owner@Example.com", "free", ROLE_ADMIN)
            .await
            .unwrap();
        assert_eq!(profile.email, "owner@example.com");
        assert!(profile.is_admin());

        let session =
            db::sessions::find_active_session(&pool, &tokens::hash_token(&token), utils::now())
                .await
                .unwrap()
                .unwrap();
        assert_eq!(session.user_id, profile.id);

        let err = create_user(&pool, "owner@example.com", "free", ROLE_MEMBER)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_user_rejects_bad_input() {
        let pool = pool_with_plans().await;

        assert!(create_user(&pool, "a@b.com", "free", "root").await.is_err());
        assert!(create_user(&pool, "a@b.com", "platinum", ROLE_MEMBER)
            .await
            .is_err());
        assert!(create_user(&pool, "not-an-email", "free", ROLE_MEMBER)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_set_plan() {
        let pool = pool_with_plans().await;
        create_user(&pool, "p@example.com", "free", ROLE_MEMBER)
            .await
            .unwrap();

        let profile = set_plan(&pool, "p@example.com", "pro").await.unwrap();
        assert_eq!(profile.plan, "pro");

        assert!(set_plan(&pool, "p@example.com", "platinum").await.is_err());
        assert!(set_plan(&pool, "missing@example.com", "pro").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_plans_from_file() {
        let pool = init_memory_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.yaml");
        std::fs::write(
            &path,
            "version: 1\nplans:\n  - name: free\n    scans: 3\n    optimizations: 1\n    ai_rewrites: 1\n",
        )
        .unwrap();

        let report = sync_plans(&pool, &path).await.unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(db::plans::get_plan_limits(&pool, "free").await.unwrap().scans_limit, 3);
    }
}
