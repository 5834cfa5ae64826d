// Alerts raised by the scheduler when a site regresses

use crate::config::AlertConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Payload describing a score drop or newly detected issues
#[derive(Debug, Clone, Serialize)]
pub struct ScanAlert {
    pub user_id: String,
    pub website_url: String,
    pub scheduled_scan_id: i64,
    pub previous_seo_score: i64,
    pub current_seo_score: i64,
    pub score_change: i64,
    pub new_issues: Vec<String>,
    pub fixed_issues: Vec<String>,
    pub scanned_at: DateTime<Utc>,
}

#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &ScanAlert) -> Result<()>;
}

/// POSTs each alert as JSON to a webhook
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn notify(&self, alert: &ScanAlert) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(alert)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                service: "Alert webhook".to_string(),
                status: status.as_u16(),
                details,
            });
        }

        info!(
            "Alert sent for {} (change {})",
            alert.website_url, alert.score_change
        );
        Ok(())
    }
}

/// Writes alerts to the log when no webhook is configured
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: &ScanAlert) -> Result<()> {
        warn!(
            user_id = %alert.user_id,
            "SEO alert for {}: score {} -> {} ({:+}), {} new issues",
            alert.website_url,
            alert.previous_seo_score,
            alert.current_seo_score,
            alert.score_change,
            alert.new_issues.len()
        );
        Ok(())
    }
}

/// Pick the notifier for the configured alert channel
pub fn from_config(config: &AlertConfig) -> Result<Arc<dyn AlertNotifier>> {
    match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(url)?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert() -> ScanAlert {
        ScanAlert {
            user_id: "u1".into(),
            website_url: "https://a.com/".into(),
            scheduled_scan_id: 1,
            previous_seo_score: 80,
            current_seo_score: 70,
            score_change: -10,
            new_issues: vec!["h1_missing".into()],
            fixed_issues: vec![],
            scanned_at: crate::utils::now(),
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_alert() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "website_url": "https://a.com/",
                "score_change": -10
            })))
            .with_status(204)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hook", server.url())).unwrap();
        notifier.notify(&alert()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_failure_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(503)
            .with_body("down")
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hook", server.url())).unwrap();
        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = from_config(&AlertConfig { webhook_url: None }).unwrap();
        assert!(notifier.notify(&alert()).await.is_ok());
    }
}
