use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;

pub async fn create_project(
    pool: &DbPool,
    user_id: &str,
    name: &str,
    website_url: &str,
) -> Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (user_id, name, website_url, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(website_url)
    .bind(utils::now())
    .fetch_one(pool)
    .await?;

    Ok(project)
}

pub async fn list_projects(pool: &DbPool, user_id: &str) -> Result<Vec<Project>> {
    let projects = sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(projects)
}

/// Hard-delete one of the user's projects
pub async fn delete_project(pool: &DbPool, user_id: &str, project_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ? AND user_id = ?")
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Project {project_id} not found")));
    }

    Ok(())
}
