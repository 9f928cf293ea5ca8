//! Key layout of the harvest bucket.
//!
//! Harvest blobs:   `{base_prefix}/{YYYY-MM-DD}/bulk_<origin>_<dest>_<YYYYMMDD_HHMMSS>.json`
//! Derived tables:  `{base_prefix}/{YYYY-MM-DD}/<name>.json`
//! Map artifacts:   `{base_prefix}/{YYYY-MM-DD}/maps/<name>.html`
//!
//! Derived artifacts must never be named like a harvest blob; the `bulk_`
//! prefix is reserved for observations.

use chrono::{NaiveDate, NaiveDateTime};
use model::StationPair;

pub fn day_prefix(base_prefix: &str, date: NaiveDate) -> String {
    format!("{}/{}/", base_prefix, date.format("%Y-%m-%d"))
}

pub fn blob_key(base_prefix: &str, date: NaiveDate, filename: &str) -> String {
    format!("{}{}", day_prefix(base_prefix, date), filename)
}

pub fn analytics_key(base_prefix: &str, date: NaiveDate, name: &str) -> String {
    format!("{}{}.json", day_prefix(base_prefix, date), name)
}

pub fn map_key(base_prefix: &str, date: NaiveDate, name: &str) -> String {
    format!("{}maps/{}.html", day_prefix(base_prefix, date), name)
}

/// Name of one harvest blob within its day directory.
pub fn bulk_blob_name(pair: &StationPair, captured_at: NaiveDateTime) -> String {
    format!(
        "bulk_{}_{}_{}.json",
        pair.origin,
        pair.destination,
        captured_at.format("%Y%m%d_%H%M%S"),
    )
}

/// A parsed `bulk_…` blob name. The timestamp is kept as the raw
/// `YYYYMMDD_HHMMSS` string: by construction its lexicographic order is its
/// chronological order, which is what the loader sorts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkBlobName {
    pub pair: StationPair,
    pub timestamp: String,
}

impl BulkBlobName {
    /// Parses a blob filename (without any directory prefix). Names that do
    /// not match the harvest pattern yield `None`.
    pub fn parse(filename: &str) -> Option<Self> {
        let rest = filename.strip_prefix("bulk_")?.strip_suffix(".json")?;
        let parts = rest.split('_').collect::<Vec<_>>();
        if parts.len() != 4 {
            return None;
        }
        let (origin, destination, date, time) = (parts[0], parts[1], parts[2], parts[3]);
        if origin.is_empty() || destination.is_empty() {
            return None;
        }
        if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if time.len() != 6 || !time.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            pair: StationPair::new(origin, destination),
            timestamp: format!("{}_{}", date, time),
        })
    }
}

/// Filename portion of an object key (everything after the last `/`).
pub fn filename_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
