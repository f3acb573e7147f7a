//! Pattern-based field extraction from listing page text.
//!
//! Everything here is syntactic: prices are `$` amounts, bedrooms are
//! "N bed" phrases, and so on. A field that cannot be matched stays `None`.
//! None of these functions fail; empty or garbled input produces an empty
//! record.

use crate::models::ListingRecord;
use chrono::{Datelike, Utc};
use regex::{Captures, Regex};
use scraper::Html;
use serde_json::{json, Value};
use std::sync::LazyLock;

/// Longest description excerpt kept on a record
pub const DESCRIPTION_CHARS: usize = 500;

const MONEY: &str = r"\$\s?(\d[\d,]*(?:\.\d+)?)(?:\s?(k|mm|m|million|thousand)\b)?";

static RE_PRICE_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:\b(?:list(?:ing)?|asking|sale)\s+price\s*:?|\bprice\s*:)\s*{}",
        MONEY
    ))
    .unwrap()
});
static RE_PRICE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("(?i){}", MONEY)).unwrap());

static RE_BEDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.,])(\d{1,2})[\s-]*(?:bd|beds?|bedrooms?|br)\b").unwrap()
});
static RE_BEDS_LABELED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:beds?|bedrooms?)\s*:?\s*(\d{1,2})\b").unwrap());

static RE_BATHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.,])(\d{1,2}(?:\.\d{1,2})?)[\s-]*(?:ba|baths?|bathrooms?)\b").unwrap()
});
static RE_BATHS_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:baths?|bathrooms?)\s*:?\s*(\d{1,2}(?:\.\d{1,2})?)\b").unwrap()
});

static RE_SQFT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\d.,])(\d{1,3}(?:,\d{3})+|\d+)[\s-]*(?:sq\.?\s*ft\.?|sqft|square\s+f(?:ee|oo)t)(\s+lot)?",
    )
    .unwrap()
});
static RE_SQFT_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sq\.?\s*ft|sqft|square\s+feet)\s*:\s*(\d{1,3}(?:,\d{3})+|\d+)").unwrap()
});

static RE_LOT_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\blot\s+size\s*:?\s*(\d[\d,]*(?:\.\d+)?\s*(?:acres?|sq\.?\s*ft\.?|sqft|square\s+feet))",
    )
    .unwrap()
});
static RE_LOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?\s*(?:acres?\b|(?:sq\.?\s*ft\.?|sqft)\s+lot\b))").unwrap()
});

static RE_YEAR_BUILT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:built\s+in|year\s+built\s*:?)\s*(\d{4})\b").unwrap()
});

static RE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,6}\s+(?:[A-Za-z0-9.'\-]+\s+){0,5}?(?:St|Street|Ave|Avenue|Rd|Road|Blvd|Boulevard|Dr|Drive|Ln|Lane|Way|Ct|Court|Pl|Place|Ter|Terrace|Pkwy|Parkway|Cir|Circle|Hwy|Highway|Loop|Trl|Trail)\b\.?(?:\s+(?:Apt|Unit|#)\s*[A-Za-z0-9\-]+)?)",
    )
    .unwrap()
});
static RE_CITY_STATE_ZIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z.'\-]*(?:\s+[A-Z][A-Za-z.'\-]*){0,3}),\s*([A-Z]{2})\s+(\d{5})(?:-\d{4})?\b")
        .unwrap()
});
static RE_CITY_STATE_ZIP_AFTER_STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*,\s*([A-Z][A-Za-z.'\-]*(?:\s+[A-Z][A-Za-z.'\-]*){0,3}),\s*([A-Z]{2})\s+(\d{5})(?:-\d{4})?\b")
        .unwrap()
});

static RE_PROPERTY_TYPE_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bproperty\s+type\s*:?\s*([A-Za-z][A-Za-z /\-]{1,40})").unwrap()
});
static RE_PROPERTY_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(single[\s-]family|condo(?:minium)?s?|town\s?(?:house|home)s?|multi[\s-]family|mobile\s+homes?|manufactured(?:\s+homes?)?|co-?op|apartments?|vacant\s+land|lots?/land)\b",
    )
    .unwrap()
});

static RE_LISTING_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:listed\s+on|list(?:ing)?\s+date\s*:?)\s*([a-z]{3,9}\.?\s+\d{1,2},\s+\d{4}|\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{2}-\d{2})",
    )
    .unwrap()
});

/// Build a record for `url` from markdown, plain text or HTML content
pub fn extract_listing(url: &str, content: &str) -> ListingRecord {
    let text = normalize(content);
    let mut record = ListingRecord::new(url);

    record.price = extract_price(&text);
    record.bedrooms = extract_bedrooms(&text);
    record.bathrooms = extract_bathrooms(&text);
    record.sqft = extract_sqft(&text);
    record.lot_size = extract_lot_size(&text);
    record.year_built = extract_year_built(&text);
    record.property_type = extract_property_type(&text);
    record.listing_date = first_capture(&RE_LISTING_DATE, &text);

    if let Some(address) = extract_address(&text) {
        record.address = address.street;
        record.city = address.city;
        record.state = address.state;
        record.zip_code = address.zip_code;
    }

    record.description = excerpt(&text, DESCRIPTION_CHARS);
    record
}

/// Collapse whitespace, flatten HTML and drop markdown emphasis markers
fn normalize(content: &str) -> String {
    let flattened = if looks_like_html(content) {
        html_to_text(content)
    } else {
        content.replace('*', "")
    };
    flattened.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_html(content: &str) -> bool {
    content.trim_start().starts_with('<')
}

/// Visible text of an HTML document, skipping scripts and styles
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        let text = text.trim();
        if !hidden && !text.is_empty() {
            parts.push(text);
        }
    }

    parts.join(" ")
}

/// First `max_chars` characters of the whitespace-normalised text
pub fn excerpt(text: &str, max_chars: usize) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => collapsed[..idx].trim_end().to_string(),
        None => collapsed,
    })
}

pub fn extract_price(text: &str) -> Option<u64> {
    if let Some(price) = RE_PRICE_LABELED
        .captures(text)
        .and_then(|caps| money_from_captures(&caps))
    {
        return Some(price);
    }

    RE_PRICE
        .captures_iter(text)
        .filter(|caps| caps.get(0).is_some_and(|m| !is_rate(text, m.start(), m.end())))
        .find_map(|caps| money_from_captures(&caps))
}

/// Amounts quoted per unit (`$361/sqft`, `Price per sqft $361`, `$350/mo`)
fn is_rate(text: &str, start: usize, end: usize) -> bool {
    if text[end..].trim_start().starts_with('/') {
        return true;
    }
    let window = window_before(text, start, 20);
    // Only the label right before this amount, not a neighbouring one
    let label = window.rsplit(['|', '$']).next().unwrap_or_default();
    label.contains("per sq") || label.contains("per square")
}

/// Parse a free-form price string such as `"$1.2M"` or `"650000"`
pub fn parse_price_text(raw: &str) -> Option<u64> {
    if let Some(price) = RE_PRICE.captures(raw).and_then(|caps| money_from_captures(&caps)) {
        return Some(price);
    }
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse::<f64>().ok().map(|v| v.round() as u64)
}

fn money_from_captures(caps: &Captures<'_>) -> Option<u64> {
    let amount: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" || suffix == "thousand" => 1_000.0,
        Some(suffix) if suffix == "m" || suffix == "mm" || suffix == "million" => 1_000_000.0,
        _ => 1.0,
    };
    let value = (amount * multiplier).round();
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

pub fn extract_bedrooms(text: &str) -> Option<u32> {
    first_capture(&RE_BEDS, text)
        .or_else(|| first_capture(&RE_BEDS_LABELED, text))
        .and_then(|n| n.parse().ok())
}

pub fn extract_bathrooms(text: &str) -> Option<f64> {
    first_capture(&RE_BATHS, text)
        .or_else(|| first_capture(&RE_BATHS_LABELED, text))
        .and_then(|n| n.parse().ok())
}

pub fn extract_sqft(text: &str) -> Option<u32> {
    let living_area = RE_SQFT.captures_iter(text).find_map(|caps| {
        // "5,000 sqft lot" / "Lot size: 5,000 sqft" describe the lot
        if caps.get(2).is_some() {
            return None;
        }
        let number = caps.get(1)?;
        if mentions_lot_before(text, number.start()) {
            return None;
        }
        Some(number.as_str().to_string())
    });

    living_area
        .or_else(|| first_capture(&RE_SQFT_LABELED, text))
        .and_then(|n| n.replace(',', "").parse().ok())
}

fn mentions_lot_before(text: &str, idx: usize) -> bool {
    window_before(text, idx, 16).contains("lot")
}

/// Lowercased last `chars` characters of `text[..idx]`
fn window_before(text: &str, idx: usize, chars: usize) -> String {
    let window: String = text[..idx]
        .chars()
        .rev()
        .take(chars)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    window.to_ascii_lowercase()
}

pub fn extract_lot_size(text: &str) -> Option<String> {
    first_capture(&RE_LOT_LABELED, text)
        .or_else(|| first_capture(&RE_LOT, text))
        .map(|lot| lot.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn extract_year_built(text: &str) -> Option<u16> {
    let max_year = Utc::now().year() + 1;
    RE_YEAR_BUILT
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
        .find(|year| (1700..=max_year).contains(year))
        .and_then(|year| u16::try_from(year).ok())
}

pub fn extract_property_type(text: &str) -> Option<String> {
    if let Some(label) = first_capture(&RE_PROPERTY_TYPE_LABELED, text) {
        let label = label.trim().trim_end_matches(['-', '/']).trim();
        if !label.is_empty() {
            return canonical_property_type(label).or_else(|| Some(label.to_string()));
        }
    }
    first_capture(&RE_PROPERTY_TYPE, text).and_then(|kw| canonical_property_type(&kw))
}

fn canonical_property_type(raw: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let label = if lower.starts_with("single") {
        "Single Family"
    } else if lower.starts_with("condo") {
        "Condo"
    } else if lower.starts_with("town") {
        "Townhouse"
    } else if lower.starts_with("multi") {
        "Multi-Family"
    } else if lower.starts_with("mobile") || lower.starts_with("manufactured") {
        "Mobile/Manufactured"
    } else if lower.starts_with("co-op") || lower.starts_with("coop") {
        "Co-op"
    } else if lower.starts_with("apartment") {
        "Apartment"
    } else if lower.contains("land") {
        "Land"
    } else {
        return None;
    };
    Some(label.to_string())
}

#[derive(Debug, Default, PartialEq)]
struct AddressParts {
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
}

fn extract_address(text: &str) -> Option<AddressParts> {
    let mut parts = AddressParts::default();

    if let Some(street) = RE_ADDRESS.captures(text).and_then(|caps| caps.get(1)) {
        parts.street = Some(street.as_str().trim().to_string());
        if let Some(caps) = RE_CITY_STATE_ZIP_AFTER_STREET.captures(&text[street.end()..]) {
            fill_city_state_zip(&mut parts, &caps);
        }
    }

    if parts.city.is_none() {
        if let Some(caps) = RE_CITY_STATE_ZIP.captures(text) {
            fill_city_state_zip(&mut parts, &caps);
        }
    }

    (parts != AddressParts::default()).then_some(parts)
}

fn fill_city_state_zip(parts: &mut AddressParts, caps: &Captures<'_>) {
    parts.city = caps.get(1).map(|m| m.as_str().trim().to_string());
    parts.state = caps.get(2).map(|m| m.as_str().to_string());
    parts.zip_code = caps.get(3).map(|m| m.as_str().to_string());
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// JSON schema sent for provider-side structured extraction
pub fn listing_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "price": { "type": "string" },
            "bedrooms": { "type": "number" },
            "bathrooms": { "type": "number" },
            "sqft": { "type": "number" },
            "address": { "type": "string" },
            "city": { "type": "string" },
            "state": { "type": "string" },
            "zip_code": { "type": "string" },
            "property_type": { "type": "string" },
            "description": { "type": "string" },
            "listing_date": { "type": "string" },
            "lot_size": { "type": "string" },
            "year_built": { "type": "number" }
        }
    })
}

/// Map a provider `extract` object onto a record.
///
/// Providers are loose about types, so numbers are accepted either as JSON
/// numbers or as numeric strings. Anything unusable is left absent.
pub fn from_structured(url: &str, extracted: &Value) -> ListingRecord {
    let mut record = ListingRecord::new(url);
    let Some(fields) = extracted.as_object() else {
        return record;
    };

    record.price = fields.get("price").and_then(|v| match v {
        Value::Number(n) => n.as_f64().filter(|p| *p >= 0.0).map(|p| p.round() as u64),
        Value::String(s) => parse_price_text(s),
        _ => None,
    });
    record.bedrooms = fields.get("bedrooms").and_then(number_field).map(|n| n.round() as u32);
    record.bathrooms = fields.get("bathrooms").and_then(number_field);
    record.sqft = fields.get("sqft").and_then(number_field).map(|n| n.round() as u32);
    record.year_built = fields
        .get("year_built")
        .and_then(number_field)
        .map(|n| n.round() as i32)
        .filter(|year| (1700..=Utc::now().year() + 1).contains(year))
        .and_then(|year| u16::try_from(year).ok());

    record.address = string_field(fields.get("address"));
    record.city = string_field(fields.get("city"));
    record.state = string_field(fields.get("state"));
    record.zip_code = string_field(fields.get("zip_code"));
    record.property_type = string_field(fields.get("property_type"));
    record.listing_date = string_field(fields.get("listing_date"));
    record.lot_size = string_field(fields.get("lot_size"));
    record.description = string_field(fields.get("description"))
        .and_then(|d| excerpt(&d, DESCRIPTION_CHARS));

    record
}

fn number_field(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite() && *n >= 0.0)
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
