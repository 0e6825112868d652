//! Timestamp and label normalization of raw source documents
//!
//! Converts one dynamically-shaped document into a delivery-ready record:
//! a nanosecond epoch timestamp, a message body, and the label set the log
//! store indexes on. Only the timestamp is fatal to a record; every other
//! field degrades gracefully (substitute or omit).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::NormalizeError;

/// A dynamically-shaped log document as retrieved from the source index
pub type RawDocument = serde_json::Map<String, Value>;

/// Fixed `app` label value identifying this tool
pub const APP_LABEL: &str = "graylog-forwarder";

/// Fixed `data_origin` label value marking migrated documents
pub const DATA_ORIGIN: &str = "historical";

/// Timestamp layout written by the source: space-separated date and time
/// with millisecond precision and no zone, interpreted as UTC
const CUSTOM_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A record ready for delivery to the push endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// Nanosecond-precision Unix epoch, encoded as a decimal string
    pub timestamp_nanos: String,
    /// Log line body
    pub message: String,
    /// Label set attached to the record's stream
    pub labels: HashMap<String, String>,
}

/// Convert one raw document into a [`NormalizedRecord`]
///
/// The label set always contains `app`, `source_index` and `data_origin`;
/// `app_name`, `log_level` and `host` are added when the document carries
/// usable values for them. A document without a string `message` field is
/// not dropped: the whole document is serialized as the message body
/// instead, with a warning.
///
/// # Errors
///
/// Returns an error only when the `timestamp` field is missing, not a
/// string, or parseable by neither supported format.
pub fn normalize(doc: &RawDocument, source_index: &str) -> Result<NormalizedRecord, NormalizeError> {
    let raw_timestamp = doc
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingTimestamp)?;
    let timestamp = parse_timestamp(raw_timestamp)?;
    let nanos = timestamp
        .timestamp_nanos_opt()
        .ok_or_else(|| NormalizeError::InvalidTimestamp {
            value: raw_timestamp.to_string(),
            reason: "instant is outside the nanosecond-epoch range".to_string(),
        })?;

    let message = match doc.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => {
            let serialized = Value::Object(doc.clone()).to_string();
            tracing::warn!(
                document = %serialized,
                "'message' field not found in log, sending full JSON doc as message"
            );
            serialized
        }
    };

    let mut labels = HashMap::from([
        ("app".to_string(), APP_LABEL.to_string()),
        ("source_index".to_string(), source_index.to_string()),
        ("data_origin".to_string(), DATA_ORIGIN.to_string()),
    ]);

    if let Some(app) = doc.get("app").and_then(Value::as_str) {
        labels.insert("app_name".to_string(), app.to_string());
    }

    match doc.get("level") {
        Some(Value::Number(level)) => {
            // JSON numbers may arrive as floats; truncate like the source did
            let level = level
                .as_i64()
                .or_else(|| level.as_f64().map(|f| f as i64))
                .unwrap_or(-1);
            labels.insert("log_level".to_string(), severity_label(level).to_string());
        }
        Some(Value::String(level)) => {
            labels.insert("log_level".to_string(), level.to_lowercase());
        }
        _ => {}
    }

    if let Some(host) = doc.get("host").and_then(Value::as_str) {
        labels.insert("host".to_string(), host.to_string());
    }

    Ok(NormalizedRecord {
        timestamp_nanos: nanos.to_string(),
        message,
        labels,
    })
}

/// Parse a document timestamp in either supported format
///
/// Tries the source's custom layout first, then falls back to RFC 3339
/// (optional fractional seconds, mandatory offset), logging a warning when
/// the fallback is the one that matched.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, NormalizeError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, CUSTOM_TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }

    match DateTime::parse_from_rfc3339(value) {
        Ok(timestamp) => {
            tracing::warn!(
                timestamp = %value,
                "timestamp did not match custom format, parsed as RFC 3339"
            );
            Ok(timestamp.with_timezone(&Utc))
        }
        Err(e) => Err(NormalizeError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Map a numeric syslog severity onto its label value
fn severity_label(level: i64) -> &'static str {
    match level {
        0 => "emergency",
        1 => "alert",
        2 => "critical",
        3 => "error",
        4 => "warning",
        5 => "notice",
        6 => "info",
        7 => "debug",
        _ => "unknown",
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Epoch nanoseconds of 2024-02-14T20:30:55.410Z
    const REFERENCE_NANOS: &str = "1707942655410000000";

    fn doc(value: Value) -> RawDocument {
        match value {
            Value::Object(map) => map,
            other => panic!("test document must be an object, got {other}"),
        }
    }

    #[test]
    fn custom_format_timestamp_yields_exact_utc_nanos() {
        let record = normalize(
            &doc(json!({ "timestamp": "2024-02-14 20:30:55.410", "message": "hello" })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(record.timestamp_nanos, REFERENCE_NANOS);
        assert_eq!(record.message, "hello");
    }

    #[test]
    fn rfc3339_fallback_converts_offset_to_utc() {
        // Same instant as the reference, expressed with a +01:00 offset
        let record = normalize(
            &doc(json!({ "timestamp": "2024-02-14T21:30:55.410+01:00", "message": "hello" })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(record.timestamp_nanos, REFERENCE_NANOS);
    }

    #[test]
    fn both_formats_round_trip_to_the_same_instant() {
        let custom = normalize(
            &doc(json!({ "timestamp": "2024-02-14 20:30:55.410", "message": "x" })),
            "graylog_0",
        )
        .unwrap();
        let iso = normalize(
            &doc(json!({ "timestamp": "2024-02-14T20:30:55.410Z", "message": "x" })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(custom.timestamp_nanos, iso.timestamp_nanos);
    }

    #[test]
    fn missing_timestamp_is_fatal_to_the_record() {
        let err = normalize(&doc(json!({ "message": "no clock" })), "graylog_0").unwrap_err();
        assert!(matches!(err, NormalizeError::MissingTimestamp));
    }

    #[test]
    fn non_string_timestamp_is_fatal_to_the_record() {
        let err = normalize(
            &doc(json!({ "timestamp": 1707942655, "message": "numeric clock" })),
            "graylog_0",
        )
        .unwrap_err();
        assert!(matches!(err, NormalizeError::MissingTimestamp));
    }

    #[test]
    fn unparseable_timestamp_reports_the_raw_value() {
        let err = normalize(
            &doc(json!({ "timestamp": "last tuesday", "message": "x" })),
            "graylog_0",
        )
        .unwrap_err();

        match err {
            NormalizeError::InvalidTimestamp { value, .. } => assert_eq!(value, "last tuesday"),
            other => panic!("expected InvalidTimestamp, got {other}"),
        }
    }

    #[test]
    fn missing_message_falls_back_to_full_document_serialization() {
        let document = doc(json!({ "timestamp": "2024-02-14 20:30:55.410", "host": "web-1" }));
        let record = normalize(&document, "graylog_0").unwrap();

        assert_eq!(record.message, Value::Object(document.clone()).to_string());
        // The fallback body must round-trip back to the original document
        let reparsed: Value = serde_json::from_str(&record.message).unwrap();
        assert_eq!(reparsed, Value::Object(document));
    }

    #[test]
    fn non_string_message_also_falls_back_to_serialization() {
        let document = doc(json!({ "timestamp": "2024-02-14 20:30:55.410", "message": 42 }));
        let record = normalize(&document, "graylog_0").unwrap();

        assert_eq!(record.message, Value::Object(document).to_string());
    }

    #[test]
    fn fixed_labels_are_always_present() {
        let record = normalize(
            &doc(json!({ "timestamp": "2024-02-14 20:30:55.410", "message": "x" })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(record.labels["app"], "graylog-forwarder");
        assert_eq!(record.labels["source_index"], "graylog_0");
        assert_eq!(record.labels["data_origin"], "historical");
        assert_eq!(record.labels.len(), 3, "no optional labels expected");
    }

    #[test]
    fn numeric_severity_levels_map_through_the_table() {
        for (level, expected) in [
            (0, "emergency"),
            (1, "alert"),
            (2, "critical"),
            (3, "error"),
            (4, "warning"),
            (5, "notice"),
            (6, "info"),
            (7, "debug"),
            (99, "unknown"),
        ] {
            let record = normalize(
                &doc(json!({
                    "timestamp": "2024-02-14 20:30:55.410",
                    "message": "x",
                    "level": level,
                })),
                "graylog_0",
            )
            .unwrap();
            assert_eq!(record.labels["log_level"], expected, "level {level}");
        }
    }

    #[test]
    fn float_severity_level_truncates_before_mapping() {
        let record = normalize(
            &doc(json!({
                "timestamp": "2024-02-14 20:30:55.410",
                "message": "x",
                "level": 3.7,
            })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(record.labels["log_level"], "error");
    }

    #[test]
    fn string_severity_level_is_lowercased_verbatim() {
        let record = normalize(
            &doc(json!({
                "timestamp": "2024-02-14 20:30:55.410",
                "message": "x",
                "level": "WARN",
            })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(record.labels["log_level"], "warn");
    }

    #[test]
    fn optional_labels_are_copied_when_present() {
        let record = normalize(
            &doc(json!({
                "timestamp": "2024-02-14 20:30:55.410",
                "message": "x",
                "app": "billing",
                "host": "web-1",
            })),
            "graylog_0",
        )
        .unwrap();

        assert_eq!(record.labels["app_name"], "billing");
        assert_eq!(record.labels["host"], "web-1");
        // The fixed `app` label is not overwritten by the document's field
        assert_eq!(record.labels["app"], "graylog-forwarder");
    }

    #[test]
    fn non_string_optional_fields_are_omitted() {
        let record = normalize(
            &doc(json!({
                "timestamp": "2024-02-14 20:30:55.410",
                "message": "x",
                "app": 7,
                "host": ["web-1"],
            })),
            "graylog_0",
        )
        .unwrap();

        assert!(!record.labels.contains_key("app_name"));
        assert!(!record.labels.contains_key("host"));
    }
}
