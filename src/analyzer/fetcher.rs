use crate::error::{Error, Result};
use crate::utils::validation;
use reqwest::{header, Client, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 10;

/// HTTP page fetcher with retry logic and a body size cap
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    initial_backoff: Duration,
    max_page_size: usize,
}

#[derive(Debug)]
pub struct FetchedPage {
    pub final_url: String,
    pub content: String,
    pub content_type: Option<String>,
}

impl Fetcher {
    pub fn new(user_agent: String, max_page_size: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .redirect(validation::guarded_redirects(MAX_REDIRECTS))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_page_size,
        })
    }

    /// Fetch a URL, retrying transport failures with exponential backoff
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if retries < self.max_retries && Self::is_retryable(&e) => {
                    retries += 1;
                    warn!(
                        "Fetch failed (attempt {}/{}): {}. Retrying in {:?}",
                        retries, self.max_retries, e, backoff
                    );
                    sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedPage> {
        debug!("Fetching: {}", url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                service: "Target site".to_string(),
                status: status.as_u16(),
                details: format!("Fetching {url} returned HTTP {status}"),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if let Some(ref ct) = content_type {
            let ct_lower = ct.to_lowercase();
            if !ct_lower.starts_with("text/html") && !ct_lower.starts_with("application/xhtml") {
                // Scored anyway; some servers mislabel HTML
                warn!("Unexpected content type: {} for {}", ct, url);
            }
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_page_size as u64 {
                return Err(Error::Validation(format!(
                    "Page size {} exceeds maximum {}",
                    content_length, self.max_page_size
                )));
            }
        }

        let content = self.read_with_limit(response).await?;

        Ok(FetchedPage {
            final_url,
            content,
            content_type,
        })
    }

    async fn read_with_limit(&self, response: Response) -> Result<String> {
        let bytes = response.bytes().await?;

        if bytes.len() > self.max_page_size {
            return Err(Error::Validation(format!(
                "Page size {} exceeds maximum {}",
                bytes.len(),
                self.max_page_size
            )));
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn is_retryable(error: &Error) -> bool {
        match error {
            Error::Http(e) => {
                !e.is_redirect() && (e.is_timeout() || e.is_connect() || e.is_request())
            }
            Error::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = Fetcher::new("TestBot/1.0".to_string(), 5_242_880);
        assert!(fetcher.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("<html><title>Hello</title></html>")
            .create_async()
            .await;

        let fetcher = Fetcher::new("TestBot/1.0".to_string(), 1024).unwrap();
        let page = fetcher.fetch(&format!("{}/", server.url())).await.unwrap();

        assert!(page.content.contains("Hello"));
        assert_eq!(
            page.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_redirect_to_private_address_is_refused() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/moved")
            .with_status(302)
            .with_header("location", "http://169.254.169.254/latest/meta-data")
            .expect(1)
            .create_async()
            .await;

        let fetcher = Fetcher::new("TestBot/1.0".to_string(), 1024).unwrap();
        let err = fetcher
            .fetch(&format!("{}/moved", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Http(ref e) if e.is_redirect()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let fetcher = Fetcher::new("TestBot/1.0".to_string(), 1024).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Upstream { status: 404, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_page() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/big")
            .with_status(200)
            .with_body("x".repeat(2048))
            .create_async()
            .await;

        let fetcher = Fetcher::new("TestBot/1.0".to_string(), 1024).unwrap();
        let err = fetcher
            .fetch(&format!("{}/big", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
    }
}
