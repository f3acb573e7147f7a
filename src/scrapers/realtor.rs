use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::extract::{excerpt, extract_listing, from_structured, listing_schema};
use crate::models::{ListingRecord, ScrapeResult};
use crate::scrapers::firecrawl::FirecrawlClient;
use crate::scrapers::rate_limit::RateLimiter;
use crate::scrapers::traits::ScrapeApi;
use crate::scrapers::types::{CrawlOptions, ScrapeOptions, ScrapedPage, SearchFilter};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

pub const REALTOR_BASE_URL: &str = "https://www.realtor.com";
const DETAIL_PATH: &str = "/realestateandhomes-detail/";
const RAW_EXCERPT_CHARS: usize = 2000;

/// How listing fields are obtained from a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMode {
    /// Fetch markdown/HTML and run the local pattern extractor
    #[default]
    Pattern,
    /// Ask the provider to fill the listing schema
    Structured,
}

/// Realtor.com listing scraper.
///
/// Requests go out one at a time through the rate limiter. Single-listing
/// calls return errors to the caller; batch and search calls record the
/// failure for that item and move on.
pub struct ListingScraper<A: ScrapeApi> {
    api: A,
    limiter: RateLimiter,
    mode: ExtractMode,
    crawl_limit: u32,
    wait_for_ms: u64,
    base_url: String,
}

impl ListingScraper<FirecrawlClient> {
    /// Scraper backed by Firecrawl, paced according to `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = FirecrawlClient::new(config)?;
        let limiter = RateLimiter::new(config.min_delay, config.batch_size, config.batch_pause);
        Ok(Self::new(api, limiter).with_crawl(config.crawl_limit, config.wait_for_ms))
    }
}

impl<A: ScrapeApi> ListingScraper<A> {
    pub fn new(api: A, limiter: RateLimiter) -> Self {
        Self {
            api,
            limiter,
            mode: ExtractMode::default(),
            crawl_limit: 10,
            wait_for_ms: 2000,
            base_url: REALTOR_BASE_URL.to_string(),
        }
    }

    pub fn with_mode(mut self, mode: ExtractMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the page limit and render wait used for search crawls
    pub fn with_crawl(mut self, limit: u32, wait_for_ms: u64) -> Self {
        self.crawl_limit = limit;
        self.wait_for_ms = wait_for_ms;
        self
    }

    /// Build the search URL for `filter`
    pub fn build_search_url(&self, filter: &SearchFilter) -> Result<String> {
        build_search_url(&self.base_url, filter)
    }

    /// Scrape one listing page into a record
    pub async fn scrape_single(&mut self, url: &str) -> Result<ListingRecord> {
        let (record, _) = self.fetch_listing(url).await?;
        Ok(record)
    }

    /// Scrape one listing page, recording any failure in the result
    pub async fn scrape_page(&mut self, url: &str) -> ScrapeResult {
        match self.fetch_listing(url).await {
            Ok((record, raw_excerpt)) => ScrapeResult::success(url, vec![record], raw_excerpt),
            Err(e) => {
                warn!(url, error = %e, "Failed to scrape listing");
                ScrapeResult::failure(url, &e)
            }
        }
    }

    /// Scrape each URL in order; one result per input URL
    pub async fn scrape_batch(&mut self, urls: &[String]) -> Vec<ScrapeResult> {
        let mut results = Vec::with_capacity(urls.len());

        for (i, url) in urls.iter().enumerate() {
            info!("Scraping listing {}/{}: {}", i + 1, urls.len(), url);
            results.push(self.scrape_page(url).await);
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(total = results.len(), failed, "Batch finished");
        results
    }

    /// Crawl search results for `filter` and scrape every listing found.
    ///
    /// A crawl failure aborts the search. Pages that link to no listing
    /// detail pages are extracted directly, so each crawled page yields at
    /// least one record.
    pub async fn search_results(&mut self, filter: &SearchFilter) -> Result<Vec<ScrapeResult>> {
        let search_url = self.build_search_url(filter)?;
        info!(
            url = %search_url,
            limit = self.crawl_limit,
            backend = self.api.source_name(),
            "Crawling search results"
        );

        self.limiter.acquire().await;
        let options = CrawlOptions::new(self.crawl_limit, self.wait_for_ms);
        let pages = self.api.crawl(&search_url, &options).await?;

        let mut results = Vec::new();
        let mut seen = HashSet::new();
        let mut listing_urls = Vec::new();

        for page in &pages {
            if page.url.contains(DETAIL_PATH) {
                if seen.insert(page.url.clone()) {
                    results.push(self.result_from_page(&page.url, page));
                }
                continue;
            }

            let links = self.detail_links(page);
            if links.is_empty() {
                debug!(url = %page.url, "No listing links on page, extracting page content");
                results.push(self.result_from_page(&page.url, page));
                continue;
            }

            for link in links {
                if seen.insert(link.clone()) {
                    listing_urls.push(link);
                }
            }
        }

        info!(
            pages = pages.len(),
            listings = listing_urls.len(),
            "Found {} unique listings",
            listing_urls.len()
        );

        results.extend(self.scrape_batch(&listing_urls).await);
        Ok(results)
    }

    /// Successful listings for `filter`; failed listings are logged and skipped
    pub async fn scrape_search(&mut self, filter: &SearchFilter) -> Result<Vec<ListingRecord>> {
        let results = self.search_results(filter).await?;

        let mut listings = Vec::new();
        for result in results {
            if result.success {
                listings.extend(result.listings);
            } else {
                warn!(
                    url = %result.source_url,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Skipping failed listing"
                );
            }
        }

        info!("✅ Scraped {} listings", listings.len());
        Ok(listings)
    }

    async fn fetch_listing(&mut self, url: &str) -> Result<(ListingRecord, Option<String>)> {
        self.limiter.acquire().await;

        let options = match self.mode {
            ExtractMode::Pattern => ScrapeOptions::default(),
            ExtractMode::Structured => ScrapeOptions::structured(listing_schema()),
        };

        let page = self.api.scrape(url, &options).await?;
        let record = self.record_from_page(url, &page);
        let raw_excerpt = page
            .markdown
            .as_deref()
            .and_then(|m| excerpt(m, RAW_EXCERPT_CHARS));

        debug!(url, price = ?record.price, bedrooms = ?record.bedrooms, "Extracted listing");
        Ok((record, raw_excerpt))
    }

    fn record_from_page(&self, url: &str, page: &ScrapedPage) -> ListingRecord {
        match (&self.mode, &page.extract) {
            (ExtractMode::Structured, Some(extracted)) => from_structured(url, extracted),
            _ => extract_listing(url, page.text()),
        }
    }

    fn result_from_page(&self, url: &str, page: &ScrapedPage) -> ScrapeResult {
        let record = extract_listing(url, page.text());
        let raw_excerpt = page
            .markdown
            .as_deref()
            .and_then(|m| excerpt(m, RAW_EXCERPT_CHARS));
        ScrapeResult::success(url, vec![record], raw_excerpt)
    }

    /// Absolute listing-detail links on `page`, in page order
    fn detail_links(&self, page: &ScrapedPage) -> Vec<String> {
        let base = Url::parse(&page.url)
            .or_else(|_| Url::parse(&self.base_url))
            .ok();

        page.links
            .iter()
            .filter(|link| link.contains(DETAIL_PATH))
            .filter_map(|link| match &base {
                Some(base) => base.join(link).ok(),
                None => Url::parse(link).ok(),
            })
            .map(|mut url| {
                url.set_fragment(None);
                url.to_string()
            })
            .collect()
    }
}

/// `{base}/realestateandhomes-search/{location}` plus the bounds that are set
pub fn build_search_url(base_url: &str, filter: &SearchFilter) -> Result<String> {
    let invalid = || ScrapeError::Configuration(format!("Invalid base URL: {}", base_url));

    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    let location = filter
        .location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .push("realestateandhomes-search")
        .push(&location);

    let mut params = Vec::new();
    if let Some(v) = filter.price_min {
        params.push(("price-min", v.to_string()));
    }
    if let Some(v) = filter.price_max {
        params.push(("price-max", v.to_string()));
    }
    if let Some(v) = filter.beds_min {
        params.push(("beds-min", v.to_string()));
    }
    if let Some(v) = filter.beds_max {
        params.push(("beds-max", v.to_string()));
    }
    if let Some(v) = filter.baths_min {
        params.push(("baths-min", v.to_string()));
    }
    if let Some(v) = filter.baths_max {
        params.push(("baths-max", v.to_string()));
    }

    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url.into())
}
