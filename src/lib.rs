//! Listing Scout: pulls real-estate listings through the Firecrawl API,
//! extracts listing fields from the returned page text and exports the
//! results as CSV or JSON.

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod scrapers;

pub use config::Config;
pub use error::{Result, ScrapeError};
pub use models::{ListingRecord, ScrapeResult};
pub use scrapers::{ListingScraper, SearchFilter};
