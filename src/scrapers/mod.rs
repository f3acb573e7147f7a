pub mod firecrawl;
pub mod rate_limit;
pub mod realtor;
pub mod traits;
pub mod types;

pub use firecrawl::FirecrawlClient;
pub use rate_limit::RateLimiter;
pub use realtor::{build_search_url, ExtractMode, ListingScraper};
pub use traits::ScrapeApi;
pub use types::{ContentFormat, CrawlOptions, ScrapeOptions, ScrapedPage, SearchFilter};
