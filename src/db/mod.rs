pub mod comparisons;
pub mod models;
pub mod optimizations;
pub mod organizations;
pub mod plans;
pub mod profiles;
pub mod projects;
pub mod results;
pub mod rewrites;
pub mod scheduled_scans;
pub mod sessions;
pub mod tokens;
pub mod usage;

use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

// How long a writer waits on SQLite's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

async fn ensure_parent_dir(database_url: &str) -> Result<()> {
    if is_memory_url(database_url) {
        return Ok(());
    }
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        let path = path.trim_start_matches("//");
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }
    Ok(())
}

/// Initialize database connection pool
pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    ensure_parent_dir(database_url).await?;

    let options = connect_options(database_url)?;

    // An in-memory database lives and dies with its single connection
    let max_connections = if is_memory_url(database_url) { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Initialize database connection pool with custom configuration
pub async fn init_pool_with_config(config: &DatabaseConfig) -> Result<DbPool> {
    if is_memory_url(&config.url) {
        return init_pool(&config.url).await;
    }

    ensure_parent_dir(&config.url).await?;

    let options = connect_options(&config.url)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// In-memory database with the schema applied
pub async fn init_memory_pool() -> Result<DbPool> {
    let pool = init_pool("sqlite::memory:").await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_pool() {
        let pool = init_pool("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_file_pool_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}/nested/test.db", dir.path().display());

        let pool = init_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert!(dir.path().join("nested/test.db").exists());
    }
}
