use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;

/// Insert or replace the limits for a plan
pub async fn upsert_plan_limits(
    pool: &DbPool,
    plan: &str,
    scans_limit: i64,
    optimizations_limit: i64,
    ai_rewrites_limit: i64,
) -> Result<PlanLimits> {
    let limits = sqlx::query_as::<_, PlanLimits>(
        r#"
        INSERT INTO plan_limits (plan, scans_limit, optimizations_limit, ai_rewrites_limit, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(plan) DO UPDATE SET
            scans_limit = excluded.scans_limit,
            optimizations_limit = excluded.optimizations_limit,
            ai_rewrites_limit = excluded.ai_rewrites_limit,
            updated_at = excluded.updated_at
        RETURNING *
        "#,
    )
    .bind(plan)
    .bind(scans_limit)
    .bind(optimizations_limit)
    .bind(ai_rewrites_limit)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(limits)
}

/// Get limits for a plan
pub async fn get_plan_limits(pool: &DbPool, plan: &str) -> Result<PlanLimits> {
    sqlx::query_as::<_, PlanLimits>("SELECT * FROM plan_limits WHERE plan = ?")
        .bind(plan)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Plan {plan} not found")))
}

/// Get limits for the plan a user is on
pub async fn get_limits_for_user(pool: &DbPool, user_id: &str) -> Result<PlanLimits> {
    sqlx::query_as::<_, PlanLimits>(
        r#"
        SELECT pl.*
        FROM plan_limits pl
        JOIN profiles p ON p.plan = pl.plan
        WHERE p.id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("No plan limits for user {user_id}")))
}

/// List all plans
pub async fn list_plan_limits(pool: &DbPool) -> Result<Vec<PlanLimits>> {
    let plans = sqlx::query_as::<_, PlanLimits>("SELECT * FROM plan_limits ORDER BY plan")
        .fetch_all(pool)
        .await?;

    Ok(plans)
}

/// Remove a plan that is no longer configured
pub async fn delete_plan_limits(pool: &DbPool, plan: &str) -> Result<()> {
    sqlx::query("DELETE FROM plan_limits WHERE plan = ?")
        .bind(plan)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_memory_pool, profiles};

    #[tokio::test]
    async fn test_plan_limits_upsert_and_lookup() {
        let pool = init_memory_pool().await.unwrap();

        upsert_plan_limits(&pool, "free", 10, 2, 5).await.unwrap();
        let updated = upsert_plan_limits(&pool, "free", 20, 2, 5).await.unwrap();
        assert_eq!(updated.scans_limit, 20);
        assert_eq!(list_plan_limits(&pool).await.unwrap().len(), 1);

        let profile = profiles::create_profile(
            &pool,
            &NewProfile {
                email: "a@example.com".into(),
                role: ROLE_MEMBER.into(),
                plan: "free".into(),
            },
        )
        .await
        .unwrap();

        let limits = get_limits_for_user(&pool, &profile.id).await.unwrap();
        assert_eq!(limits.plan, "free");
        assert_eq!(limits.scans_limit, 20);

        delete_plan_limits(&pool, "free").await.unwrap();
        assert!(get_plan_limits(&pool, "free").await.is_err());
    }
}
