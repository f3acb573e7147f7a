//! Firecrawl REST client.
//!
//! Wraps the `/v1/scrape` and `/v1/crawl` endpoints. Rendering, JavaScript
//! execution and bot handling all happen on the provider's side; this module
//! only builds requests, unwraps the JSON envelope and classifies failures
//! into network vs. service errors.

use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::scrapers::traits::ScrapeApi;
use crate::scrapers::types::{ContentFormat, CrawlOptions, ScrapeOptions, ScrapedPage};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("listing-scout/", env!("CARGO_PKG_VERSION"));

/// Firecrawl API client
pub struct FirecrawlClient {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

// Request/Response types for the Firecrawl API

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: &'a [ContentFormat],
    only_main_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extract: Option<ExtractRequest<'a>>,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    schema: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlRequest<'a> {
    url: &'a str,
    limit: u32,
    scrape_options: CrawlScrapeOptions<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlScrapeOptions<'a> {
    formats: &'a [ContentFormat],
    only_main_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for: Option<u64>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<PageData>,
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct PageData {
    markdown: Option<String>,
    html: Option<String>,
    #[serde(default)]
    links: Vec<String>,
    extract: Option<Value>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStartResponse {
    #[serde(default)]
    success: bool,
    id: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStatusResponse {
    status: String,
    completed: Option<u32>,
    total: Option<u32>,
    #[serde(default)]
    data: Vec<PageData>,
    next: Option<String>,
}

impl FirecrawlClient {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ScrapeError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
        })
    }

    /// Send a request and decode the JSON body, classifying failures
    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder, target: &str) -> Result<R> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| ScrapeError::Network {
                url: target.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ScrapeError::Network {
            url: target.to_string(),
            source,
        })?;

        if !status.is_success() {
            warn!(url = %target, status = status.as_u16(), "Firecrawl returned error status");
            return Err(ScrapeError::Service {
                url: target.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        debug!(url = %target, bytes = body.len(), "Firecrawl response received");

        serde_json::from_str(&body).map_err(|source| ScrapeError::Decode {
            url: target.to_string(),
            source,
        })
    }

    async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
        target: &str,
    ) -> Result<R> {
        let url = format!("{}{}", self.base_url, endpoint);
        self.send(self.client.post(&url).json(body), target).await
    }

    async fn get<R: DeserializeOwned>(&self, url: &str, target: &str) -> Result<R> {
        self.send(self.client.get(url), target).await
    }

    fn page_from_data(fallback_url: &str, data: PageData) -> ScrapedPage {
        let (title, source_url) = match data.metadata {
            Some(meta) => (meta.title, meta.source_url),
            None => (None, None),
        };

        ScrapedPage {
            url: source_url.unwrap_or_else(|| fallback_url.to_string()),
            markdown: data.markdown,
            html: data.html,
            links: data.links,
            extract: data.extract,
            title,
        }
    }
}

/// Pull a readable message out of an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ScrapeApi for FirecrawlClient {
    async fn scrape(&self, url: &str, options: &ScrapeOptions) -> Result<ScrapedPage> {
        debug!(url, formats = ?options.formats, "Scraping page");

        let request = ScrapeRequest {
            url,
            formats: &options.formats,
            only_main_content: options.only_main_content,
            wait_for: options.wait_for_ms,
            extract: options
                .extract_schema
                .as_ref()
                .map(|schema| ExtractRequest { schema }),
        };

        let response: ScrapeResponse = self.post("/v1/scrape", &request, url).await?;

        if !response.success {
            return Err(ScrapeError::Service {
                url: url.to_string(),
                status: 200,
                message: response
                    .error
                    .unwrap_or_else(|| "Firecrawl scrape failed".to_string()),
            });
        }

        let data = response.data.unwrap_or_default();
        Ok(Self::page_from_data(url, data))
    }

    async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<Vec<ScrapedPage>> {
        info!(url, limit = options.limit, "Starting Firecrawl crawl");

        let request = CrawlRequest {
            url,
            limit: options.limit,
            scrape_options: CrawlScrapeOptions {
                formats: &options.scrape.formats,
                only_main_content: options.scrape.only_main_content,
                wait_for: options.scrape.wait_for_ms,
            },
        };

        let start: CrawlStartResponse = self.post("/v1/crawl", &request, url).await?;

        let crawl_id = match (start.success, start.id) {
            (true, Some(id)) => id,
            (_, _) => {
                return Err(ScrapeError::Service {
                    url: url.to_string(),
                    status: 200,
                    message: start
                        .error
                        .unwrap_or_else(|| "Failed to start Firecrawl crawl".to_string()),
                })
            }
        };

        info!(crawl_id = %crawl_id, "Crawl started, polling for results");

        let deadline = Instant::now() + self.poll_timeout;
        let status_url = format!("{}/v1/crawl/{}", self.base_url, crawl_id);

        loop {
            if Instant::now() >= deadline {
                return Err(ScrapeError::Timeout {
                    url: url.to_string(),
                });
            }

            tokio::time::sleep(self.poll_interval).await;

            let status: CrawlStatusResponse = self.get(&status_url, url).await?;

            match status.status.as_str() {
                "completed" => {
                    let mut pages: Vec<ScrapedPage> = status
                        .data
                        .into_iter()
                        .map(|data| Self::page_from_data(url, data))
                        .collect();

                    // Large crawls are paginated
                    let mut seen = HashSet::new();
                    let mut next = status.next;
                    while let Some(next_url) = next {
                        if !seen.insert(next_url.clone()) {
                            warn!(next = %next_url, "Crawl pagination repeated a page, stopping");
                            break;
                        }
                        if Instant::now() >= deadline {
                            return Err(ScrapeError::Timeout {
                                url: url.to_string(),
                            });
                        }
                        let more: CrawlStatusResponse = self.get(&next_url, url).await?;
                        pages.extend(
                            more.data
                                .into_iter()
                                .map(|data| Self::page_from_data(url, data)),
                        );
                        next = more.next;
                    }

                    info!(url, pages = pages.len(), "Firecrawl crawl completed");
                    return Ok(pages);
                }
                "failed" | "cancelled" => {
                    return Err(ScrapeError::Service {
                        url: url.to_string(),
                        status: 200,
                        message: format!("Firecrawl crawl {}", status.status),
                    });
                }
                _ => {
                    debug!(
                        crawl_id = %crawl_id,
                        status = %status.status,
                        completed = ?status.completed,
                        total = ?status.total,
                        "Crawl in progress"
                    );
                }
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server_url: &str) -> FirecrawlClient {
        let mut config = Config::new("fc-test-key");
        config.api_url = server_url.to_string();
        config.poll_interval = Duration::from_millis(10);
        config.poll_timeout = Duration::from_secs(5);
        FirecrawlClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn scrape_sends_expected_request_and_unwraps_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/scrape")
            .match_header("authorization", "Bearer fc-test-key")
            .match_body(Matcher::PartialJson(json!({
                "url": "https://www.realtor.com/realestateandhomes-detail/1",
                "formats": ["markdown", "html"],
                "onlyMainContent": true
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "success": true,
                    "data": {
                        "markdown": "Price: $650,000 | 3 bed",
                        "html": "<p>Price: $650,000</p>",
                        "metadata": { "title": "Listing", "sourceURL": "https://www.realtor.com/realestateandhomes-detail/1" }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let page = client
            .scrape(
                "https://www.realtor.com/realestateandhomes-detail/1",
                &ScrapeOptions::default(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.markdown.as_deref(), Some("Price: $650,000 | 3 bed"));
        assert_eq!(page.title.as_deref(), Some("Listing"));
    }

    #[tokio::test]
    async fn non_success_status_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scrape")
            .with_status(402)
            .with_body(r#"{"success":false,"error":"Insufficient credits"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client
            .scrape("https://example.com/listing", &ScrapeOptions::default())
            .await
            .unwrap_err();

        match err {
            ScrapeError::Service { status, message, url } => {
                assert_eq!(status, 402);
                assert_eq!(message, "Insufficient credits");
                assert_eq!(url, "https://example.com/listing");
            }
            other => panic!("expected service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_envelope_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scrape")
            .with_status(200)
            .with_body(r#"{"success":false,"error":"Page blocked"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client
            .scrape("https://example.com/listing", &ScrapeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Service { status: 200, .. }));
    }

    #[tokio::test]
    async fn garbage_body_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/scrape")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client
            .scrape("https://example.com/listing", &ScrapeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        // Nothing listens on port 1
        let client = client_for("http://127.0.0.1:1");
        let err = client
            .scrape("https://example.com/listing", &ScrapeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Network { .. }));
    }

    #[tokio::test]
    async fn structured_scrape_sends_schema() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/scrape")
            .match_body(Matcher::PartialJson(json!({
                "formats": ["extract"],
                "extract": { "schema": { "type": "object" } }
            })))
            .with_status(200)
            .with_body(r#"{"success":true,"data":{"extract":{"bedrooms":3}}}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let page = client
            .scrape(
                "https://example.com/listing",
                &ScrapeOptions::structured(json!({ "type": "object" })),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.extract, Some(json!({ "bedrooms": 3 })));
        assert_eq!(page.url, "https://example.com/listing");
    }

    #[tokio::test]
    async fn crawl_polls_until_completed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/crawl")
            .match_body(Matcher::PartialJson(json!({
                "limit": 5,
                "scrapeOptions": { "formats": ["markdown", "links"], "waitFor": 2000 }
            })))
            .with_status(200)
            .with_body(r#"{"success":true,"id":"job-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/job-1")
            .with_status(200)
            .with_body(
                json!({
                    "status": "completed",
                    "completed": 1,
                    "total": 1,
                    "data": [{
                        "markdown": "search page",
                        "links": ["https://www.realtor.com/realestateandhomes-detail/a"],
                        "metadata": { "sourceURL": "https://www.realtor.com/realestateandhomes-search/X" }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let pages = client
            .crawl(
                "https://www.realtor.com/realestateandhomes-search/X",
                &CrawlOptions::new(5, 2000),
            )
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(
            pages[0].links,
            vec!["https://www.realtor.com/realestateandhomes-detail/a".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_crawl_is_service_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/crawl")
            .with_status(200)
            .with_body(r#"{"success":true,"id":"job-2"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/job-2")
            .with_status(200)
            .with_body(r#"{"status":"failed"}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client
            .crawl("https://example.com/search", &CrawlOptions::new(5, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Service { .. }));
    }

    #[tokio::test]
    async fn crawl_that_never_finishes_times_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/crawl")
            .with_status(200)
            .with_body(r#"{"success":true,"id":"job-slow"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/job-slow")
            .with_status(200)
            .with_body(r#"{"status":"scraping","completed":0,"total":3}"#)
            .create_async()
            .await;

        let mut config = Config::new("fc-test-key");
        config.api_url = server.url();
        config.poll_interval = Duration::from_millis(10);
        config.poll_timeout = Duration::from_millis(50);
        let client = FirecrawlClient::new(&config).unwrap();

        let err = client
            .crawl("https://example.com/search", &CrawlOptions::new(5, 0))
            .await
            .unwrap_err();
        match err {
            ScrapeError::Timeout { url } => assert_eq!(url, "https://example.com/search"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn completed_crawl_follows_next_pages_in_order() {
        let mut server = mockito::Server::new_async().await;
        let next_page = format!("{}/v1/crawl/job-3?skip=1", server.url());
        server
            .mock("POST", "/v1/crawl")
            .with_status(200)
            .with_body(r#"{"success":true,"id":"job-3"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/job-3")
            .with_status(200)
            .with_body(
                json!({
                    "status": "completed",
                    "data": [{ "markdown": "first", "metadata": { "sourceURL": "https://example.com/1" } }],
                    "next": next_page
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/crawl/job-3?skip=1")
            .with_status(200)
            .with_body(
                json!({
                    "status": "completed",
                    "data": [
                        { "markdown": "second", "metadata": { "sourceURL": "https://example.com/2" } },
                        { "markdown": "third", "metadata": { "sourceURL": "https://example.com/3" } }
                    ]
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let pages = client
            .crawl("https://example.com/search", &CrawlOptions::new(5, 0))
            .await
            .unwrap();

        second.assert_async().await;
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/1", "https://example.com/2", "https://example.com/3"]
        );
    }

    #[tokio::test]
    async fn repeated_next_page_stops_pagination() {
        let mut server = mockito::Server::new_async().await;
        let next_page = format!("{}/v1/crawl/job-4?skip=1", server.url());
        server
            .mock("POST", "/v1/crawl")
            .with_status(200)
            .with_body(r#"{"success":true,"id":"job-4"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/crawl/job-4")
            .with_status(200)
            .with_body(
                json!({
                    "status": "completed",
                    "data": [{ "markdown": "first", "metadata": { "sourceURL": "https://example.com/1" } }],
                    "next": next_page
                })
                .to_string(),
            )
            .create_async()
            .await;
        let looping = server
            .mock("GET", "/v1/crawl/job-4?skip=1")
            .with_status(200)
            .with_body(
                json!({
                    "status": "completed",
                    "data": [{ "markdown": "second", "metadata": { "sourceURL": "https://example.com/2" } }],
                    "next": next_page
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let pages = client
            .crawl("https://example.com/search", &CrawlOptions::new(5, 0))
            .await
            .unwrap();

        looping.assert_async().await;
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(error_message(r#"{"error":"Rate limited"}"#), "Rate limited");
        assert_eq!(error_message("  plain text  "), "plain text");
    }
}
