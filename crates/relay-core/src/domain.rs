use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{errors::Error, Result};

/// `extra` tag that pins a message: it is never evicted.
pub const PINNED_TAG: &str = "INIT";

/// `extra` tag a client sets when it failed to produce data for a command
/// (e.g. geolocation denied in the browser).
pub const CLIENT_ERROR_TAG: &str = "ERROR";

/// A stored chat message.
///
/// This is the exact wire and on-disk shape; messages are immutable once stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    pub sender: String,
    pub timestamp: String,
    #[serde(default)]
    pub extra: Option<String>,
}

impl Message {
    /// A server-generated message stamped with the current instant.
    pub fn synthesized(sender: &str, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: sender.to_string(),
            timestamp: crate::utils::iso_timestamp_utc(),
            extra: Some(String::new()),
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.extra.as_deref() == Some(PINNED_TAG)
    }

    /// The instant this message was sent, per [`parse_timestamp`].
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Geographic point used by the weather lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A validated, not yet censored submission.
///
/// Coordinates ride along on the request for `!weather` but are not stored.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingMessage {
    pub content: String,
    pub sender: String,
    pub timestamp: String,
    pub extra: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl IncomingMessage {
    /// Validate a raw request body.
    ///
    /// Required fields are checked in order (`content`, `sender`, `timestamp`)
    /// and the first missing one is reported. A non-string value counts as missing.
    pub fn from_json(body: &Value) -> Result<Self> {
        let Some(obj) = body.as_object().filter(|o| !o.is_empty()) else {
            return Err(Error::validation("No message"));
        };

        let field = |name: &str| obj.get(name).and_then(Value::as_str).map(str::to_string);

        let content = field("content").ok_or_else(|| Error::validation("No content"))?;
        let sender = field("sender").ok_or_else(|| Error::validation("No sender"))?;
        let timestamp = field("timestamp").ok_or_else(|| Error::validation("No timestamp"))?;
        if parse_timestamp(&timestamp).is_none() {
            return Err(Error::validation("Invalid timestamp"));
        }

        let extra = field("extra");
        let coordinates = match (
            obj.get("latitude").and_then(as_coordinate),
            obj.get("longitude").and_then(as_coordinate),
        ) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        Ok(Self {
            content,
            sender,
            timestamp,
            extra,
            coordinates,
        })
    }

    pub fn has_client_error(&self) -> bool {
        self.extra.as_deref() == Some(CLIENT_ERROR_TAG)
    }
}

// Browsers send numbers; some clients send them as strings.
fn as_coordinate(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

/// Parse a stored or submitted timestamp into an absolute instant.
///
/// RFC 3339 offsets are honored. ISO-8601 without a zone is assumed to be UTC.
/// Anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parse_timestamp_honors_offsets() {
        let dt = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn parse_timestamp_assumes_utc_without_zone() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:00:00.000"), Some(expected));
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn incoming_reports_first_missing_field() {
        let ts = "2024-05-01T12:00:00Z";
        let err = IncomingMessage::from_json(&json!({"sender": "a", "timestamp": ts})).unwrap_err();
        assert_eq!(err.to_string(), "No content");

        let err =
            IncomingMessage::from_json(&json!({"content": "hi", "timestamp": ts})).unwrap_err();
        assert_eq!(err.to_string(), "No sender");

        let err = IncomingMessage::from_json(&json!({"content": "hi", "sender": "a"})).unwrap_err();
        assert_eq!(err.to_string(), "No timestamp");

        let err = IncomingMessage::from_json(&json!([])).unwrap_err();
        assert_eq!(err.to_string(), "No message");
    }

    #[test]
    fn incoming_rejects_non_string_and_bad_timestamp() {
        let err = IncomingMessage::from_json(
            &json!({"content": 5, "sender": "a", "timestamp": "2024-05-01T12:00:00Z"}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "No content");

        let err = IncomingMessage::from_json(
            &json!({"content": "hi", "sender": "a", "timestamp": "soon"}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid timestamp");
    }

    #[test]
    fn incoming_reads_coordinates_as_numbers_or_strings() {
        let msg = IncomingMessage::from_json(&json!({
            "content": "!weather",
            "sender": "a",
            "timestamp": "2024-05-01T12:00:00Z",
            "latitude": 52.5,
            "longitude": "13.4",
        }))
        .unwrap();
        assert_eq!(
            msg.coordinates,
            Some(Coordinates {
                latitude: 52.5,
                longitude: 13.4
            })
        );

        let msg = IncomingMessage::from_json(&json!({
            "content": "!weather",
            "sender": "a",
            "timestamp": "2024-05-01T12:00:00Z",
            "latitude": 52.5,
        }))
        .unwrap();
        assert_eq!(msg.coordinates, None);
    }

    #[test]
    fn message_without_extra_deserializes() {
        let m: Message = serde_json::from_value(json!({
            "content": "hi",
            "sender": "a",
            "timestamp": "2024-05-01T12:00:00Z",
        }))
        .unwrap();
        assert_eq!(m.extra, None);
        assert!(!m.is_pinned());
    }
}
