use crate::error::ScrapeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single listing pulled out of a scraped page.
///
/// Only `url` and `scraped_at` are guaranteed. Extraction is best effort, so
/// every other field may be absent; `None` means "not found", not zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub url: String,
    pub price: Option<u64>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<u32>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub property_type: Option<String>,
    pub description: Option<String>,
    pub listing_date: Option<String>,
    pub lot_size: Option<String>,
    pub year_built: Option<u16>,
    pub scraped_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Empty record for `url`, stamped with the current time
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            price: None,
            bedrooms: None,
            bathrooms: None,
            sqft: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            property_type: None,
            description: None,
            listing_date: None,
            lot_size: None,
            year_built: None,
            scraped_at: Utc::now(),
        }
    }

    /// Price per square foot when both sides are known
    pub fn price_per_sqft(&self) -> Option<f64> {
        match (self.price, self.sqft) {
            (Some(price), Some(sqft)) if sqft > 0 => Some(price as f64 / sqft as f64),
            _ => None,
        }
    }

    /// True when nothing beyond the URL and timestamp was recovered
    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.sqft.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state.is_none()
            && self.zip_code.is_none()
            && self.property_type.is_none()
            && self.description.is_none()
            && self.listing_date.is_none()
            && self.lot_size.is_none()
            && self.year_built.is_none()
    }
}

/// Outcome of scraping one target URL, kept together with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub source_url: String,
    pub listings: Vec<ListingRecord>,
    pub raw_excerpt: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub status: Option<u16>,
}

impl ScrapeResult {
    pub fn success(
        source_url: impl Into<String>,
        listings: Vec<ListingRecord>,
        raw_excerpt: Option<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            listings,
            raw_excerpt,
            success: true,
            error: None,
            status: None,
        }
    }

    pub fn failure(source_url: impl Into<String>, error: &ScrapeError) -> Self {
        Self {
            source_url: source_url.into(),
            listings: Vec::new(),
            raw_excerpt: None,
            success: false,
            error: Some(error.to_string()),
            status: error.status(),
        }
    }
}
