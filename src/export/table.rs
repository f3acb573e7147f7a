use crate::models::ListingRecord;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Numeric columns available for summary statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Price,
    Bedrooms,
    Bathrooms,
    Sqft,
    YearBuilt,
    PricePerSqft,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Price => "price",
            Column::Bedrooms => "bedrooms",
            Column::Bathrooms => "bathrooms",
            Column::Sqft => "sqft",
            Column::YearBuilt => "year_built",
            Column::PricePerSqft => "price_per_sqft",
        }
    }

    fn value(&self, record: &ListingRecord) -> Option<f64> {
        match self {
            Column::Price => record.price.map(|v| v as f64),
            Column::Bedrooms => record.bedrooms.map(f64::from),
            Column::Bathrooms => record.bathrooms,
            Column::Sqft => record.sqft.map(f64::from),
            Column::YearBuilt => record.year_built.map(f64::from),
            Column::PricePerSqft => record.price_per_sqft(),
        }
    }
}

/// Columns a table can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    City,
    State,
    ZipCode,
    PropertyType,
    Bedrooms,
}

impl GroupKey {
    fn value(&self, record: &ListingRecord) -> Option<String> {
        match self {
            GroupKey::City => record.city.clone(),
            GroupKey::State => record.state.clone(),
            GroupKey::ZipCode => record.zip_code.clone(),
            GroupKey::PropertyType => record.property_type.clone(),
            GroupKey::Bedrooms => record.bedrooms.map(|b| b.to_string()),
        }
    }
}

/// Descriptive statistics over the present values of one column
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two values
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Stats {
    fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = (count > 1).then(|| {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        });

        Some(Self {
            count,
            mean,
            std,
            min: values[0],
            q25: quantile(&values, 0.25),
            median: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values[count - 1],
        })
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "count  {}", self.count)?;
        writeln!(f, "mean   {:.2}", self.mean)?;
        match self.std {
            Some(std) => writeln!(f, "std    {:.2}", std)?,
            None => writeln!(f, "std    n/a")?,
        }
        writeln!(f, "min    {:.2}", self.min)?;
        writeln!(f, "25%    {:.2}", self.q25)?;
        writeln!(f, "50%    {:.2}", self.median)?;
        writeln!(f, "75%    {:.2}", self.q75)?;
        write!(f, "max    {:.2}", self.max)
    }
}

/// Linear-interpolated quantile of already sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Aggregates of a column within one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub key: String,
    pub mean: f64,
    pub median: f64,
    pub count: usize,
}

/// Post-scrape row filter.
///
/// Rows missing a filtered field never pass that filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    pub min_sqft: Option<u32>,
    /// Keep rows whose property type contains any of these, ignoring case
    pub property_types: Vec<String>,
}

impl RowFilter {
    pub fn is_empty(&self) -> bool {
        self.min_sqft.is_none() && self.property_types.is_empty()
    }

    pub fn matches(&self, record: &ListingRecord) -> bool {
        if let Some(min) = self.min_sqft {
            if !record.sqft.is_some_and(|sqft| sqft >= min) {
                return false;
            }
        }
        if self.property_types.is_empty() {
            return true;
        }
        let Some(kind) = record.property_type.as_deref() else {
            return false;
        };
        let kind = kind.to_lowercase();
        self.property_types
            .iter()
            .any(|wanted| kind.contains(&wanted.to_lowercase()))
    }
}

/// Tabular view over a set of listings for summary work
#[derive(Debug, Clone)]
pub struct ListingTable {
    rows: Vec<ListingRecord>,
}

impl ListingTable {
    pub fn from_records(records: &[ListingRecord]) -> Self {
        Self {
            rows: records.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[ListingRecord] {
        &self.rows
    }

    /// One entry per row; absent values stay `None`
    pub fn column(&self, column: Column) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| column.value(r)).collect()
    }

    pub fn describe(&self, column: Column) -> Option<Stats> {
        Stats::from_values(self.column(column).into_iter().flatten().collect())
    }

    /// Rows accepted by `filter`, as a new table
    pub fn filter(&self, filter: &RowFilter) -> ListingTable {
        Self {
            rows: self.rows.iter().filter(|r| filter.matches(r)).cloned().collect(),
        }
    }

    /// Mean, median and count of `column` per distinct `by` value, skipping
    /// rows missing either
    pub fn group_stats(&self, by: GroupKey, column: Column) -> Vec<GroupStats> {
        let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
        for row in &self.rows {
            if let (Some(key), Some(value)) = (by.value(row), column.value(row)) {
                groups.entry(key).or_default().push(value);
            }
        }

        let mut stats: Vec<GroupStats> = groups
            .into_iter()
            .filter_map(|(key, values)| {
                let summary = Stats::from_values(values)?;
                Some(GroupStats {
                    key,
                    mean: summary.mean,
                    median: summary.median,
                    count: summary.count,
                })
            })
            .collect();
        stats.sort_by(|a, b| compare_keys(&a.key, &b.key));
        stats
    }

    /// Percentage of rows where each field is present, in CSV column order
    pub fn completeness(&self) -> Vec<(&'static str, f64)> {
        let total = self.rows.len();
        let pct = |present: usize| {
            if total == 0 {
                0.0
            } else {
                present as f64 * 100.0 / total as f64
            }
        };
        let count = |f: fn(&ListingRecord) -> bool| self.rows.iter().filter(|r| f(r)).count();

        vec![
            ("url", pct(count(|r| !r.url.is_empty()))),
            ("price", pct(count(|r| r.price.is_some()))),
            ("bedrooms", pct(count(|r| r.bedrooms.is_some()))),
            ("bathrooms", pct(count(|r| r.bathrooms.is_some()))),
            ("sqft", pct(count(|r| r.sqft.is_some()))),
            ("address", pct(count(|r| r.address.is_some()))),
            ("city", pct(count(|r| r.city.is_some()))),
            ("state", pct(count(|r| r.state.is_some()))),
            ("zip_code", pct(count(|r| r.zip_code.is_some()))),
            ("property_type", pct(count(|r| r.property_type.is_some()))),
            ("description", pct(count(|r| r.description.is_some()))),
            ("listing_date", pct(count(|r| r.listing_date.is_some()))),
            ("lot_size", pct(count(|r| r.lot_size.is_some()))),
            ("year_built", pct(count(|r| r.year_built.is_some()))),
            ("scraped_at", pct(total)),
        ]
    }

    /// Rows whose price falls outside 1.5 × IQR
    pub fn price_outliers(&self) -> Vec<&ListingRecord> {
        let Some(stats) = self.describe(Column::Price) else {
            return Vec::new();
        };
        let iqr = stats.q75 - stats.q25;
        let low = stats.q25 - 1.5 * iqr;
        let high = stats.q75 + 1.5 * iqr;

        self.rows
            .iter()
            .filter(|r| {
                Column::Price
                    .value(r)
                    .map(|p| p < low || p > high)
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Numeric keys sort numerically, everything else lexically
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}
