//! JSON codec for cached values.
//!
//! Timestamps are written as ISO-8601 UTC strings with millisecond precision
//! (`2025-03-01T12:00:00.000Z`). On read, every string of that shape is
//! recognised wherever it sits in the document, at any depth, validated, and
//! handed to the typed decoder, which turns it back into a `DateTime<Utc>`.

use super::CacheError;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::LazyLock;

/// `strftime` layout of cached timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$")
        .expect("timestamp pattern is valid")
});

/// Format a timestamp the way it is stored.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Returns `true` when `s` has the stored timestamp shape.
pub fn looks_like_timestamp(s: &str) -> bool {
    ISO_TIMESTAMP.is_match(s)
}

/// Parse a stored timestamp. Returns `None` for anything else.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !looks_like_timestamp(s) {
        return None;
    }
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serialize a value for the cache.
pub fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    Ok(serde_json::to_string(value)?)
}

/// Deserialize a cached value.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, CacheError> {
    let mut value: Value = serde_json::from_str(raw)?;
    revive_timestamps(&mut value)?;
    Ok(serde_json::from_value(value)?)
}

/// Walk `value` and normalise every timestamp-shaped string.
///
/// A string that has the shape but is not a real instant
/// (`2025-13-40T...`) is an error rather than silently kept as text.
pub fn revive_timestamps(value: &mut Value) -> Result<(), CacheError> {
    match value {
        Value::String(s) if looks_like_timestamp(s) => {
            let ts =
                parse_timestamp(s).ok_or_else(|| CacheError::InvalidTimestamp(s.clone()))?;
            *s = format_timestamp(&ts);
        }
        Value::Array(items) => {
            for item in items {
                revive_timestamps(item)?;
            }
        }
        Value::Object(fields) => {
            for (_, field) in fields.iter_mut() {
                revive_timestamps(field)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// `#[serde(with = "...")]` adapter for `DateTime<Utc>` fields.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .or_else(|| {
                DateTime::parse_from_rfc3339(&raw)
                    .ok()
                    .map(|ts| ts.with_timezone(&Utc))
            })
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

/// `#[serde(with = "...")]` adapter for `Option<DateTime<Utc>>` fields.
pub mod timestamp_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => super::timestamp::serialize(ts, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::timestamp")] DateTime<Utc>);

        let wrapped = Option::<Wrapped>::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapped(ts)| ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Participant;
    use chrono::TimeZone;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Outer {
        label: String,
        inner: Inner,
        history: Vec<Inner>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Inner {
        #[serde(with = "timestamp")]
        at: DateTime<Utc>,
        #[serde(default, with = "timestamp_opt")]
        until: Option<DateTime<Utc>>,
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn timestamps_are_written_with_millisecond_precision() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2025-03-01T12:00:00.000Z");
        assert_eq!(parse_timestamp("2025-03-01T12:00:00.000Z"), Some(ts));
        assert_eq!(parse_timestamp("2025-03-01"), None);
    }

    #[test]
    fn nested_timestamps_survive_a_cache_round_trip() {
        let value = Outer {
            label: "2025-03-01".into(),
            inner: Inner {
                at: at(1_740_830_400_123),
                until: None,
            },
            history: vec![Inner {
                at: at(1_700_000_000_000),
                until: Some(at(1_700_000_100_500)),
            }],
        };

        let raw = encode(&value).unwrap();
        assert!(raw.contains("\"2025-03-01T12:00:00.123Z\""));
        let back: Outer = decode(&raw).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn impossible_dates_are_rejected() {
        let raw = r#"{"at":"2025-13-40T99:00:00.000Z"}"#;
        let err = decode::<Inner>(raw).unwrap_err();
        assert!(matches!(err, CacheError::InvalidTimestamp(_)));
    }

    #[test]
    fn participant_snapshot_round_trips() {
        let participant = Participant {
            room_id: "r1".into(),
            user_id: "u1".into(),
            username: Some("alice".into()),
            is_active: true,
            exited_at: None,
            created_at: at(1_740_830_400_000),
            updated_at: at(1_740_830_401_999),
        };

        let back: Participant = decode(&encode(&participant).unwrap()).unwrap();
        assert_eq!(back, participant);
    }
}
