//! Serde helpers for the `eta`/`expires` header timestamps.
//!
//! Written strictly as `YYYY-MM-DDTHH:MM:SS` (no fraction, no offset).
//! Reading also accepts fractional seconds and RFC 3339 offsets, which the
//! Python producer emits; offsets are normalised to UTC.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

/// Wire timestamp pattern
pub const ISO8601: &str = "%Y-%m-%dT%H:%M:%S";

pub fn format(ts: &NaiveDateTime) -> String {
    ts.format(ISO8601).to_string()
}

pub fn parse(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, ISO8601)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

pub fn serialize<S: Serializer>(ts: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => serializer.serialize_str(&format(ts)),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_micro_opt(7, 5, 3, 250_000)
            .unwrap()
    }

    #[test]
    fn test_format_drops_fraction_and_offset() {
        assert_eq!(format(&sample()), "2024-03-09T07:05:03");
    }

    #[test]
    fn test_parse_variants() {
        let whole = sample().with_nanosecond(0).unwrap();
        assert_eq!(parse("2024-03-09T07:05:03"), Some(whole));
        assert_eq!(parse("2024-03-09T07:05:03.250000"), Some(sample()));
        assert_eq!(parse("2024-03-09T09:05:03.25+02:00"), Some(sample()));
        assert_eq!(parse("yesterday"), None);
    }
}
