use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Search parameters for a listing search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchFilter {
    /// Location slug as used in search URLs, e.g. `San-Francisco_CA`
    pub location: String,
    /// Minimum price (USD)
    pub price_min: Option<u64>,
    /// Maximum price (USD)
    pub price_max: Option<u64>,
    /// Minimum number of bedrooms
    pub beds_min: Option<u32>,
    /// Maximum number of bedrooms
    pub beds_max: Option<u32>,
    /// Minimum number of bathrooms
    pub baths_min: Option<f64>,
    /// Maximum number of bathrooms
    pub baths_max: Option<f64>,
}

impl SearchFilter {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            location: "San-Francisco_CA".to_string(),
            price_min: None,
            price_max: None,
            beds_min: None,
            beds_max: None,
            baths_min: None,
            baths_max: None,
        }
    }
}

/// Content formats the scraping service can return
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Markdown,
    Html,
    Links,
    Extract,
}

/// Options for a single scrape request
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub formats: Vec<ContentFormat>,
    pub only_main_content: bool,
    /// Milliseconds to let dynamic content settle before capture
    pub wait_for_ms: Option<u64>,
    /// JSON schema for provider-side structured extraction
    pub extract_schema: Option<Value>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            formats: vec![ContentFormat::Markdown, ContentFormat::Html],
            only_main_content: true,
            wait_for_ms: None,
            extract_schema: None,
        }
    }
}

impl ScrapeOptions {
    /// Request provider-side extraction against `schema` instead of raw content
    pub fn structured(schema: Value) -> Self {
        Self {
            formats: vec![ContentFormat::Extract],
            only_main_content: true,
            wait_for_ms: None,
            extract_schema: Some(schema),
        }
    }
}

/// Options for a multi-page crawl
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub limit: u32,
    pub scrape: ScrapeOptions,
}

impl CrawlOptions {
    pub fn new(limit: u32, wait_for_ms: u64) -> Self {
        Self {
            limit,
            scrape: ScrapeOptions {
                formats: vec![ContentFormat::Markdown, ContentFormat::Links],
                only_main_content: true,
                wait_for_ms: Some(wait_for_ms),
                extract_schema: None,
            },
        }
    }
}

/// Content returned for one page, unwrapped from the provider envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub markdown: Option<String>,
    pub html: Option<String>,
    pub links: Vec<String>,
    pub extract: Option<Value>,
    pub title: Option<String>,
}

impl ScrapedPage {
    /// Best text to run extraction against
    pub fn text(&self) -> &str {
        self.markdown
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or(self.html.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scrape_asks_for_markdown_and_html() {
        let opts = ScrapeOptions::default();
        assert_eq!(opts.formats, vec![ContentFormat::Markdown, ContentFormat::Html]);
        assert!(opts.only_main_content);
        assert!(opts.extract_schema.is_none());
    }

    #[test]
    fn page_text_falls_back_to_html() {
        let page = ScrapedPage {
            markdown: Some("   ".to_string()),
            html: Some("<p>3 bed</p>".to_string()),
            ..ScrapedPage::default()
        };
        assert_eq!(page.text(), "<p>3 bed</p>");
        assert_eq!(ScrapedPage::default().text(), "");
    }
}
