use crate::error::Result;
use crate::scrapers::types::{CrawlOptions, ScrapeOptions, ScrapedPage};
use async_trait::async_trait;

/// Common trait for page-fetching backends
/// The listing scraper only depends on this, so tests can drive it with a fake
#[async_trait]
pub trait ScrapeApi: Send + Sync {
    /// Fetch one page
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<ScrapedPage>;

    /// Crawl from `url`, returning every page the job collected
    async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<Vec<ScrapedPage>>;

    /// Get the name of the backend
    fn source_name(&self) -> &'static str;
}
