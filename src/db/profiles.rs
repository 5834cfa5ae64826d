use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;

/// Create a new profile with a generated id
pub async fn create_profile(pool: &DbPool, new_profile: &NewProfile) -> Result<Profile> {
    let id = uuid::Uuid::new_v4().to_string();

    let profile = sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (id, email, role, plan, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(new_profile.email.trim().to_lowercase())
    .bind(&new_profile.role)
    .bind(&new_profile.plan)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(profile)
}

/// Get profile by ID
pub async fn get_profile(pool: &DbPool, user_id: &str) -> Result<Profile> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Profile {user_id} not found")))
}

/// Get profile by email
pub async fn get_profile_by_email(pool: &DbPool, email: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE email = ?")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    Ok(profile)
}

/// Change a user's plan
pub async fn update_plan(pool: &DbPool, user_id: &str, plan: &str) -> Result<()> {
    let result = sqlx::query("UPDATE profiles SET plan = ? WHERE id = ?")
        .bind(plan)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Profile {user_id} not found")));
    }

    Ok(())
}

/// Number of profiles on a plan
pub async fn count_profiles_on_plan(pool: &DbPool, plan: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE plan = ?")
        .bind(plan)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_profile_crud() {
        let pool = init_memory_pool().await.unwrap();

        let profile = create_profile(
            &pool,
            &NewProfile {
                email: " Owner@Example.com ".to_string(),
                role: ROLE_MEMBER.to_string(),
                plan: "free".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(profile.email, "owner@example.com");
        assert!(!profile.is_admin());

        let by_email = get_profile_by_email(&pool, "OWNER@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, profile.id);

        update_plan(&pool, &profile.id, "pro").await.unwrap();
        assert_eq!(get_profile(&pool, &profile.id).await.unwrap().plan, "pro");

        assert!(matches!(
            get_profile(&pool, "missing").await,
            Err(Error::NotFound(_))
        ));
    }
}
