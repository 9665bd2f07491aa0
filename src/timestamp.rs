//! Timestamps in pipeline documents.
//!
//! Documents are written with RFC 3339 timestamps in UTC. Documents from
//! older tooling carry naive ISO 8601 times without an offset; those are
//! read as local time.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Parses an RFC 3339 timestamp, or a naive one taken as local time.
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Some(time.with_timezone(&Utc));
    }
    let naive = value.parse::<NaiveDateTime>().ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|time| time.with_timezone(&Utc))
}

/// `deserialize_with` helper accepting both timestamp forms.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse(&value).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", value)))
}

/// Text form used when one document refers to another by timestamp.
pub fn format(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_rfc3339() {
        let time = parse("2024-05-01T10:00:00.5+02:00").unwrap();
        assert_eq!(format(&time), "2024-05-01T08:00:00.500Z");
    }

    #[test]
    fn test_parse_naive_as_local_time() {
        let time = parse("2024-05-01T10:00:00.123456").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_micro_opt(10, 0, 0, 123_456)
            .unwrap();
        assert_eq!(time.with_timezone(&Local).naive_local(), expected);

        assert!(parse("2024-05-01T10:00:00").is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("unknown").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_format_round_trips() {
        let now = Utc::now();
        assert_eq!(parse(&format(&now)), Some(now));
    }
}
