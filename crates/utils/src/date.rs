//! Business-day helpers. Checklists are materialized per calendar date in the
//! restaurant's local offset, not per UTC date.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DateParseError {
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    Invalid(String),
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| DateParseError::Invalid(raw.to_string()))
}

/// Today's date at the given UTC offset. Offsets outside +-23h fall back to UTC.
pub fn today(utc_offset_hours: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date(" 2025-03-01 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn rejects_other_formats() {
        assert_eq!(
            parse_date("03/01/2025"),
            Err(DateParseError::Invalid("03/01/2025".to_string()))
        );
        assert!(parse_date("2025-02-30").is_err());
    }

    #[test]
    fn out_of_range_offset_uses_utc() {
        assert_eq!(today(99), Utc::now().date_naive());
    }
}
