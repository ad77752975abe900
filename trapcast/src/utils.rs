//! Utility functions for the trapcast crate

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};

/// Date parsing and calendar arithmetic shared by the loaders and builders
pub mod date_parser {
    use super::*;
    use chrono::NaiveDateTime;

    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ];

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

    /// Parse a calendar date, accepting a time part which is discarded
    pub fn parse_date(value: &str) -> Result<NaiveDate> {
        let value = value.trim();

        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return Ok(date);
            }
        }

        for format in DATETIME_FORMATS {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
                return Ok(datetime.date());
            }
        }

        // Fractional seconds and offsets: keep the leading date only
        if value.len() > 10 && value.is_char_boundary(10) {
            if let Ok(date) = NaiveDate::parse_from_str(&value[..10], "%Y-%m-%d") {
                return Ok(date);
            }
        }

        Err(ForecastError::DataError(format!(
            "Unrecognised date: '{}'",
            value
        )))
    }
}

/// Days since 1970-01-01, the physical representation of polars `Date`
pub fn to_epoch_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// Inverse of [`to_epoch_days`]
pub fn from_epoch_days(days: i32) -> Result<NaiveDate> {
    let shifted = if days >= 0 {
        epoch().checked_add_days(Days::new(days as u64))
    } else {
        epoch().checked_sub_days(Days::new(days.unsigned_abs() as u64))
    };
    shifted.ok_or_else(|| ForecastError::DataError(format!("Date out of range: {} days", days)))
}

/// Seconds since the Unix epoch at midnight UTC, as the forecaster expects
pub fn to_timestamp_seconds(date: NaiveDate) -> i64 {
    i64::from(to_epoch_days(date)) * 86_400
}

/// Every calendar day from `start` through `end`, both inclusive
pub fn daily_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2024-05-01")]
    #[case("2024-05-01 00:00:00")]
    #[case("2024-05-01T13:45:10")]
    #[case("01/05/2024")]
    #[case("2024-05-01 08:30:00.000")]
    fn parses_supported_formats(#[case] input: &str) {
        let date = date_parser::parse_date(input).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(date_parser::parse_date("yesterday").is_err());
        assert!(date_parser::parse_date("").is_err());
    }

    #[test]
    fn epoch_days_round_trip_and_anchor() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        assert_eq!(to_epoch_days(date), 10);
        assert_eq!(from_epoch_days(10).unwrap(), date);
        assert_eq!(
            from_epoch_days(-1).unwrap(),
            NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()
        );
        assert_eq!(to_timestamp_seconds(date), 864_000);
    }

    #[test]
    fn daily_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days = daily_range(start, end);
        assert_eq!(days.len(), 4); // leap year
        assert_eq!(days.first(), Some(&start));
        assert_eq!(days.last(), Some(&end));
        assert!(daily_range(end, start).is_empty());
    }
}
