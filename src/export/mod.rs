//! CSV and JSON export of listing records, plus re-import of those files.

pub mod table;

pub use table::{Column, GroupKey, GroupStats, ListingTable, RowFilter, Stats};

use crate::error::Result;
use crate::models::ListingRecord;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

/// Column order of the CSV export; matches `ListingRecord` field order
pub const CSV_HEADERS: [&str; 15] = [
    "url",
    "price",
    "bedrooms",
    "bathrooms",
    "sqft",
    "address",
    "city",
    "state",
    "zip_code",
    "property_type",
    "description",
    "listing_date",
    "lot_size",
    "year_built",
    "scraped_at",
];

/// Write records as CSV with a header row
pub fn write_csv_to<W: Write>(records: &[ListingRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if records.is_empty() {
        wtr.write_record(CSV_HEADERS)?;
    }
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse CSV rows written by [`write_csv_to`]
pub fn read_csv_from<R: Read>(reader: R) -> Result<Vec<ListingRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in rdr.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Save listings to a CSV file
pub fn export_csv(records: &[ListingRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_csv_to(records, BufWriter::new(file))?;
    info!("💾 Saved {} listings to {}", records.len(), path.display());
    Ok(())
}

/// Save listings to a pretty-printed JSON array
pub fn export_json(records: &[ListingRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    info!("💾 Saved {} listings to {}", records.len(), path.display());
    Ok(())
}

/// Load listings from a CSV export
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<ListingRecord>> {
    read_csv_from(BufReader::new(File::open(path)?))
}

pub fn read_json(path: impl AsRef<Path>) -> Result<Vec<ListingRecord>> {
    let records = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use chrono::{TimeZone, Utc};

    fn full_record() -> ListingRecord {
        ListingRecord {
            url: "https://www.realtor.com/realestateandhomes-detail/123-Main-St".to_string(),
            price: Some(650_000),
            bedrooms: Some(3),
            bathrooms: Some(2.5),
            sqft: Some(1_800),
            address: Some("123 Main St".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            zip_code: Some("62704".to_string()),
            property_type: Some("Single Family".to_string()),
            description: Some("Sunny, \"updated\" kitchen\nnear the park".to_string()),
            listing_date: Some("Mar 4, 2025".to_string()),
            lot_size: Some("0.25 acres".to_string()),
            year_built: Some(1925),
            scraped_at: Utc.with_ymd_and_hms(2025, 12, 1, 9, 30, 0).unwrap(),
        }
    }

    fn sparse_record() -> ListingRecord {
        let mut record = ListingRecord::new("https://www.realtor.com/realestateandhomes-detail/9");
        record.price = Some(410_000);
        record.zip_code = Some("02134".to_string());
        record
    }

    #[test]
    fn csv_round_trip_preserves_every_field() {
        let records = vec![full_record(), sparse_record()];

        let mut buf = Vec::new();
        write_csv_to(&records, &mut buf).unwrap();
        let parsed = read_csv_from(buf.as_slice()).unwrap();

        assert_eq!(parsed, records);
        assert_eq!(parsed[1].zip_code.as_deref(), Some("02134"));
        assert_eq!(parsed[1].bedrooms, None);
    }

    #[test]
    fn csv_header_matches_field_order() {
        let mut buf = Vec::new();
        write_csv_to(&[full_record()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().next().unwrap(), CSV_HEADERS.join(","));
    }

    #[test]
    fn empty_export_still_has_header() {
        let mut buf = Vec::new();
        write_csv_to(&[], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.trim_end(), CSV_HEADERS.join(","));
        assert!(read_csv_from(text.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn file_exports_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![full_record(), sparse_record()];

        let csv_path = dir.path().join("listings.csv");
        export_csv(&records, &csv_path).unwrap();
        assert_eq!(read_csv(&csv_path).unwrap(), records);

        let json_path = dir.path().join("listings.json");
        export_json(&records, &json_path).unwrap();
        assert_eq!(read_json(&json_path).unwrap(), records);
    }

    #[test]
    fn json_uses_flat_snake_case_fields() {
        let value = serde_json::to_value(full_record()).unwrap();
        assert_eq!(value["zip_code"], "62704");
        assert_eq!(value["year_built"], 1925);
        assert!(value["scraped_at"].is_string());
    }

    #[test]
    fn unwritable_destination_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.csv");
        let err = export_csv(&[full_record()], &path).unwrap_err();
        assert!(matches!(err, ScrapeError::Io(_)));

        let err = export_json(&[full_record()], &path).unwrap_err();
        assert!(matches!(err, ScrapeError::Io(_)));
    }
}
