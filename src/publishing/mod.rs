// Client for the blogging platform's REST posts collection

use crate::utils::{sanitize, validation};
use crate::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use url::Url;

const SERVICE_NAME: &str = "Publishing service";
const MAX_REDIRECTS: usize = 5;

/// Application-password credentials for a site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteCredentials {
    pub username: String,
    pub application_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

fn default_status() -> String {
    "draft".to_string()
}

const ALLOWED_STATUSES: &[&str] = &["draft", "publish", "pending", "private"];

/// What the platform reports back for a created post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: i64,
    pub link: String,
    pub status: String,
}

#[derive(Clone)]
pub struct PublishingClient {
    client: Client,
}

impl PublishingClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(validation::guarded_redirects(MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Create a post on `site` via `POST {site}/wp-json/wp/v2/posts`.
    /// Callers taking `site` from a request must run it through
    /// `validation::validate_url` first.
    pub async fn create_post(
        &self,
        site: &str,
        credentials: &SiteCredentials,
        post: &NewPost,
    ) -> Result<PublishedPost> {
        let url = Self::posts_url(site)?;

        if !ALLOWED_STATUSES.contains(&post.status.as_str()) {
            return Err(Error::Validation(format!(
                "status must be one of: {}",
                ALLOWED_STATUSES.join(", ")
            )));
        }

        let body = NewPost {
            title: validation::require(&post.title, "title")?.to_string(),
            content: sanitize::sanitize_html(&post.content),
            status: post.status.clone(),
            excerpt: post.excerpt.as_deref().map(sanitize::sanitize_html),
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&credentials.username, Some(&credentials.application_password))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            error!("Publishing to {} failed with {}", site, status);
            return Err(Error::Upstream {
                service: SERVICE_NAME.to_string(),
                status: status.as_u16(),
                details,
            });
        }

        let published: PublishedPost = response.json().await?;
        info!("Published post {} to {}", published.id, site);
        Ok(published)
    }

    fn posts_url(site: &str) -> Result<String> {
        let site = Url::parse(site.trim())?;
        if !matches!(site.scheme(), "http" | "https") {
            return Err(Error::Validation(
                "Site URL must use http or https".to_string(),
            ));
        }
        Ok(format!(
            "{}/wp-json/wp/v2/posts",
            site.as_str().trim_end_matches('/')
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posts_url() {
        assert_eq!(
            PublishingClient::posts_url("https://blog.example.com/").unwrap(),
            "https://blog.example.com/wp-json/wp/v2/posts"
        );
        assert!(PublishingClient::posts_url("ftp://blog.example.com").is_err());
        assert!(PublishingClient::posts_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_rejects_unknown_status() {
        let client = PublishingClient::new().unwrap();
        let err = client
            .create_post(
                "https://blog.example.com",
                &SiteCredentials {
                    username: "u".into(),
                    application_password: "p".into(),
                },
                &NewPost {
                    title: "T".into(),
                    content: "<p>C</p>".into(),
                    status: "scheduled".into(),
                    excerpt: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
