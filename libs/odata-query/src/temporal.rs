//! Date-time parsing and normalization shared by the parser and the function library.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

pub const MAX_DATETIME: &str = "9999-12-31T23:59:59.999Z";
pub const MIN_DATETIME: &str = "0001-01-01T00:00:00.000Z";

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse an ISO-8601 string: RFC 3339, a naive date-time (taken as UTC) or a bare date.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Interpret a number as milliseconds since the Unix epoch.
pub fn from_epoch_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)] // saturating float-to-int cast, range checked by chrono
    let millis = millis.trunc() as i64;
    DateTime::from_timestamp_millis(millis)
}

/// Normalized timestamp form: `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339_with_offset_normalizes_to_utc() {
        let dt = parse_datetime("2024-03-10T12:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(format_timestamp(&dt), "2024-03-10T10:30:00.000Z");
    }

    #[test]
    fn test_parse_naive_and_date_only() {
        let dt = parse_datetime("2024-03-10T08:15:42").unwrap();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (8, 15, 42));

        let date = parse_datetime("2024-03-10").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 10));
        assert_eq!(date.hour(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_datetime("yesterday").is_none());
        assert!(parse_datetime("2024-13-45").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn test_epoch_millis() {
        let dt = from_epoch_millis(0.0).unwrap();
        assert_eq!(format_timestamp(&dt), "1970-01-01T00:00:00.000Z");
        assert!(from_epoch_millis(f64::NAN).is_none());
    }

    #[test]
    fn test_boundary_constants_parse() {
        assert_eq!(
            format_timestamp(&parse_datetime(MAX_DATETIME).unwrap()),
            MAX_DATETIME
        );
        assert_eq!(
            format_timestamp(&parse_datetime(MIN_DATETIME).unwrap()),
            MIN_DATETIME
        );
    }
}
