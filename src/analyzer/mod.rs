// Page analysis: fetch a website and score it

pub mod audit;
pub mod fetcher;

use crate::config::AnalyzerConfig;
use crate::error::Result;
use crate::utils::validation;
use async_trait::async_trait;
use fetcher::Fetcher;
use tracing::info;

pub use audit::{Analysis, PageFacts, SeoIssue, Severity};

/// Produces an SEO score and issue list for a URL
#[async_trait]
pub trait SiteAnalyzer: Send + Sync {
    async fn analyze(&self, url: &str) -> Result<Analysis>;
}

/// Analyzer that fetches the live page over HTTP
pub struct HttpAnalyzer {
    fetcher: Fetcher,
}

impl HttpAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        let fetcher = Fetcher::new(config.user_agent.clone(), config.max_page_size)?;
        Ok(Self { fetcher })
    }
}

#[async_trait]
impl SiteAnalyzer for HttpAnalyzer {
    async fn analyze(&self, url: &str) -> Result<Analysis> {
        let url = validation::validate_url(url)?;
        let page = self.fetcher.fetch(url.as_str()).await?;

        // Redirects may land on a different scheme
        let is_https = page.final_url.starts_with("https://");
        let facts = PageFacts::extract(&page.content, is_https);
        let analysis = audit::score(&facts);

        info!(
            "Analyzed {}: score {} with {} issues",
            url,
            analysis.seo_score,
            analysis.issues.len()
        );

        Ok(analysis)
    }
}
