//! RFC 3339 helpers. Every timestamp crossing a boundary is UTC with
//! second precision and a `Z` suffix.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn format_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse any RFC 3339 timestamp and normalise it to UTC.
pub fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::validation(format!("invalid RFC 3339 timestamp {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn round_trip_keeps_the_second() {
        let samples = [
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap(),
            Utc::now(),
        ];
        for ts in samples {
            let back = parse_rfc3339(&format_rfc3339(&ts)).unwrap();
            assert_eq!(back.timestamp(), ts.timestamp());
        }
    }

    #[test]
    fn format_is_utc_zulu() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();
        assert_eq!(format_rfc3339(&ts), "2024-06-15T10:30:00Z");
    }

    #[test]
    fn offsets_are_normalised() {
        let ts = parse_rfc3339("2024-06-15T12:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 10);
        assert!(parse_rfc3339("yesterday").is_err());
    }
}
