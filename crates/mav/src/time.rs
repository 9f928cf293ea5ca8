//! Timestamp handling for the offer API.
//!
//! The upstream reports "no actual time yet" as the year-one sentinel
//! `0001-01-01T00:00:00+01:00` rather than omitting the field. Anything in
//! year one, an empty string, or an unparseable value maps to `None`.

use chrono::{DateTime, Datelike, NaiveDateTime};

pub fn parse_api_time(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?;
    if parsed.year() <= 1 {
        return None;
    }
    Some(parsed.naive_local())
}

/// serde helper for optional timestamp fields of the raw offer model.
pub mod optional_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_api_time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_offset_timestamps_as_local_wall_time() {
        let parsed = parse_api_time("2025-08-01T08:10:00+02:00").unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2025, 8, 1)
                .unwrap()
                .and_hms_opt(8, 10, 0)
                .unwrap()
        );
    }

    #[test]
    fn sentinel_and_junk_map_to_none() {
        assert_eq!(parse_api_time("0001-01-01T00:00:00+01:00"), None);
        assert_eq!(parse_api_time("0001-01-01T00:00:00+00:00"), None);
        assert_eq!(parse_api_time(""), None);
        assert_eq!(parse_api_time("not a time"), None);
    }
}
