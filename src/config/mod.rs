pub mod plans;
pub mod sync;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub completion: CompletionConfig,
    pub alerts: AlertConfig,
    pub analyzer: AnalyzerConfig,
    pub plans: PlansConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_rate_limit: u64,
    pub max_request_body_size: usize,
    pub default_token_rate_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub lease_seconds: i64,
    pub retry_base_minutes: i64,
    pub max_failures: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub max_page_size: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    pub path: PathBuf,
}

fn env_or<T: FromStr>(name: &str, default: &str) -> Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| Error::Config(format!("Invalid {name} value")))
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/seowatch.db".to_string());

        let completion_api_key = std::env::var("COMPLETION_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let webhook_url = std::env::var("ALERT_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Settings {
            database: DatabaseConfig {
                url: database_url,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", "1")?,
                connection_timeout_seconds: env_or("DATABASE_CONNECTION_TIMEOUT", "30")?,
                idle_timeout_seconds: env_or("DATABASE_IDLE_TIMEOUT", "600")?,
            },
            server: ServerConfig {
                host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("PORT", "3000")?,
                api_rate_limit: env_or("API_RATE_LIMIT", "20")?,
                max_request_body_size: env_or("MAX_REQUEST_BODY_SIZE", "1048576")?,
                default_token_rate_limit: env_or("DEFAULT_TOKEN_RATE_LIMIT", "100")?,
            },
            scheduler: SchedulerConfig {
                enabled: env_or("SCHEDULER_ENABLED", "true")?,
                interval_seconds: env_or("SCHEDULER_INTERVAL", "300")?,
                lease_seconds: env_or("SCHEDULER_LEASE_SECONDS", "900")?,
                retry_base_minutes: env_or("SCHEDULER_RETRY_BASE_MINUTES", "30")?,
                max_failures: env_or("SCHEDULER_MAX_FAILURES", "5")?,
            },
            completion: CompletionConfig {
                api_key: completion_api_key,
                base_url: std::env::var("COMPLETION_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: std::env::var("COMPLETION_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                timeout_seconds: env_or("COMPLETION_TIMEOUT", "120")?,
            },
            alerts: AlertConfig { webhook_url },
            analyzer: AnalyzerConfig {
                max_page_size: env_or("ANALYZER_MAX_PAGE_SIZE", "5242880")?,
                user_agent: format!("SeoWatch/{}", env!("CARGO_PKG_VERSION")),
            },
            plans: PlansConfig {
                path: std::env::var("PLANS_CONFIG_PATH")
                    .unwrap_or_else(|_| "config/plans.yaml".to_string())
                    .into(),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("Port must be non-zero".to_string()));
        }

        if self.server.api_rate_limit == 0 {
            return Err(Error::Config("API rate limit must be non-zero".to_string()));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(Error::Config(
                "Scheduler interval must be non-zero".to_string(),
            ));
        }

        if self.scheduler.lease_seconds <= 0 {
            return Err(Error::Config("Scheduler lease must be positive".to_string()));
        }

        if self.scheduler.max_failures <= 0 {
            return Err(Error::Config(
                "Scheduler max failures must be positive".to_string(),
            ));
        }

        if self.server.default_token_rate_limit <= 0 {
            return Err(Error::Config(
                "Default token rate limit must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Settings suitable for tests and local tooling: in-memory database,
    /// no completion key, log-only alerts.
    pub fn for_memory_database() -> Self {
        Settings {
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                api_rate_limit: 100,
                max_request_body_size: 1_048_576,
                default_token_rate_limit: 100,
            },
            scheduler: SchedulerConfig {
                enabled: false,
                interval_seconds: 300,
                lease_seconds: 900,
                retry_base_minutes: 30,
                max_failures: 5,
            },
            completion: CompletionConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_seconds: 120,
            },
            alerts: AlertConfig { webhook_url: None },
            analyzer: AnalyzerConfig {
                max_page_size: 5_242_880,
                user_agent: "SeoWatch/test".to_string(),
            },
            plans: PlansConfig {
                path: "config/plans.yaml".into(),
            },
        }
    }
}
