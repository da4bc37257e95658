//! Persisted identity record and the identity server response shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `expiresIn` value meaning the identifier is already expired.
pub const EXPIRES_IN_EXPIRED: f64 = -1.0;
/// `expiresIn` value meaning the server does not know the lifetime.
pub const EXPIRES_IN_UNKNOWN: f64 = -2.0;

/// Upper bound on a persisted lifetime. Browsers cap cookie lifetimes at 400 days.
pub const MAX_LIFETIME_MS: i64 = 400 * 24 * 60 * 60 * 1000;

/// Body returned by the identity server.
///
/// `atype` and `expiresIn` are read leniently: numeric strings and integral
/// floats are accepted, anything else reads as absent. Unknown fields are
/// kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdResponse {
    pub uid: String,

    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub atype: Option<i64>,

    /// Lifetime in seconds, or one of the sentinels.
    #[serde(
        rename = "expiresIn",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_in: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|f: &f64| f.is_finite()))
}

/// How long a freshly fetched identifier may be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lifetime {
    Expired,
    Unknown,
    Seconds(f64),
}

impl IdResponse {
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        match self.expires_in {
            None => Lifetime::Unknown,
            Some(v) if v == EXPIRES_IN_EXPIRED => Lifetime::Expired,
            Some(v) if v == EXPIRES_IN_UNKNOWN => Lifetime::Unknown,
            Some(v) => Lifetime::Seconds(v),
        }
    }

    /// Lifetime in whole milliseconds, rounded and clamped to `0..=MAX_LIFETIME_MS`.
    /// `None` for the expired sentinel; `default_ms` when the lifetime is unknown.
    #[must_use]
    pub fn lifetime_ms(&self, default_ms: i64) -> Option<i64> {
        match self.lifetime() {
            Lifetime::Expired => None,
            Lifetime::Unknown => Some(default_ms.clamp(0, MAX_LIFETIME_MS)),
            Lifetime::Seconds(seconds) => {
                let ms = (seconds * 1000.0).round();
                Some(if ms.is_nan() {
                    0
                } else {
                    ms.clamp(0.0, MAX_LIFETIME_MS as f64) as i64
                })
            }
        }
    }

    /// JSON view handed to `decode` by the host.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Identity record as written to local storage and the cookie.
///
/// Timestamps are optional on read: a record without `expiresAt` never
/// expires and one without `rotateAt` is never rotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atype: Option<i64>,

    #[serde(rename = "expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    #[serde(rename = "rotateAt", default, skip_serializing_if = "Option::is_none")]
    pub rotate_at: Option<i64>,
}

/// Where a record stands relative to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Absent,
    Valid,
    StaleNeedsRotation,
    Expired,
}

impl IdentityRecord {
    /// Build a record from a server response written at `now_ms`.
    #[must_use]
    pub fn from_response(
        response: &IdResponse,
        now_ms: i64,
        lifetime_ms: i64,
        rotation_interval_ms: i64,
    ) -> Self {
        Self {
            uid: response.uid.clone(),
            atype: response.atype,
            expires_at: Some(now_ms.saturating_add(lifetime_ms)),
            rotate_at: Some(now_ms.saturating_add(rotation_interval_ms)),
        }
    }

    /// Expiry wins over rotation.
    #[must_use]
    pub fn state_at(&self, now_ms: i64) -> RecordState {
        if self.expires_at.is_some_and(|at| at <= now_ms) {
            return RecordState::Expired;
        }
        if self.rotate_at.is_some_and(|at| at <= now_ms) {
            return RecordState::StaleNeedsRotation;
        }
        RecordState::Valid
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// State of an optional record, treating `None` as [`RecordState::Absent`].
#[must_use]
pub fn state_of(record: Option<&IdentityRecord>, now_ms: i64) -> RecordState {
    record.map_or(RecordState::Absent, |r| r.state_at(now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_762_423_200_000;

    fn record(expires_at: Option<i64>, rotate_at: Option<i64>) -> IdentityRecord {
        IdentityRecord {
            uid: "abc".to_string(),
            atype: Some(2),
            expires_at,
            rotate_at,
        }
    }

    #[test]
    fn test_lifetime_sentinels() {
        let mut response: IdResponse =
            serde_json::from_value(json!({"uid": "abc", "atype": 2})).expect("should parse");
        assert_eq!(response.lifetime(), Lifetime::Unknown);

        response.expires_in = Some(-1.0);
        assert_eq!(response.lifetime(), Lifetime::Expired);

        response.expires_in = Some(-2.0);
        assert_eq!(response.lifetime(), Lifetime::Unknown);

        response.expires_in = Some(7_776_000.0);
        assert_eq!(response.lifetime(), Lifetime::Seconds(7_776_000.0));
    }

    #[test]
    fn test_null_expires_in_is_unknown() {
        let response: IdResponse =
            serde_json::from_value(json!({"uid": "abc", "expiresIn": null}))
                .expect("should parse");
        assert_eq!(response.lifetime(), Lifetime::Unknown);
    }

    #[test]
    fn test_record_state_transitions() {
        assert_eq!(
            record(Some(NOW + 10), Some(NOW + 5)).state_at(NOW),
            RecordState::Valid
        );
        assert_eq!(
            record(Some(NOW + 10), Some(NOW)).state_at(NOW),
            RecordState::StaleNeedsRotation
        );
        assert_eq!(
            record(Some(NOW), Some(NOW - 5)).state_at(NOW),
            RecordState::Expired
        );
        assert_eq!(state_of(None, NOW), RecordState::Absent);
    }

    #[test]
    fn test_missing_timestamps_never_expire_or_rotate() {
        assert_eq!(record(None, None).state_at(NOW), RecordState::Valid);
        assert_eq!(
            record(None, Some(NOW - 1)).state_at(NOW),
            RecordState::StaleNeedsRotation
        );
    }

    #[test]
    fn test_record_serializes_with_camel_case_timestamps() {
        let value = record(Some(1), Some(2)).to_value();
        assert_eq!(
            value,
            json!({"uid": "abc", "atype": 2, "expiresAt": 1, "rotateAt": 2})
        );
    }

    #[test]
    fn test_from_response() {
        let response = IdResponse {
            uid: "abc".to_string(),
            atype: Some(2),
            expires_in: Some(7_776_000.0),
            extra: Map::new(),
        };
        let record = IdentityRecord::from_response(&response, NOW, 7_776_000_000, 14_400_000);
        assert_eq!(record.expires_at, Some(NOW + 7_776_000_000));
        assert_eq!(record.rotate_at, Some(NOW + 14_400_000));
        assert_eq!(record.atype, Some(2));
    }

    #[test]
    fn test_lenient_atype_and_expires_in() {
        let response: IdResponse =
            serde_json::from_value(json!({"uid": "abc", "atype": 2.0})).expect("should parse");
        assert_eq!(response.atype, Some(2));

        let response: IdResponse = serde_json::from_value(
            json!({"uid": "abc", "atype": "2", "expiresIn": "7776000"}),
        )
        .expect("should parse");
        assert_eq!(response.atype, Some(2));
        assert_eq!(response.expires_in, Some(7_776_000.0));

        let response: IdResponse =
            serde_json::from_value(json!({"uid": "abc", "atype": [1], "expiresIn": {}}))
                .expect("should parse");
        assert_eq!(response.atype, None);
        assert_eq!(response.lifetime(), Lifetime::Unknown);
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let response: IdResponse =
            serde_json::from_value(json!({"uid": "abc", "atype": 2, "segment": "x"}))
                .expect("should parse");
        assert_eq!(
            response.to_value(),
            json!({"uid": "abc", "atype": 2, "segment": "x"})
        );
    }

    #[test]
    fn test_lifetime_ms_is_rounded_and_clamped() {
        let response = |expires_in: f64| IdResponse {
            uid: "abc".to_string(),
            atype: None,
            expires_in: Some(expires_in),
            extra: Map::new(),
        };
        assert_eq!(response(1.0004).lifetime_ms(0), Some(1000));
        assert_eq!(response(1.0006).lifetime_ms(0), Some(1001));
        assert_eq!(response(1e16).lifetime_ms(0), Some(MAX_LIFETIME_MS));
        assert_eq!(response(-5.0).lifetime_ms(0), Some(0));
        assert_eq!(response(-1.0).lifetime_ms(0), None);
        assert_eq!(response(-2.0).lifetime_ms(42), Some(42));
    }

    #[test]
    fn test_from_response_saturates() {
        let response = IdResponse {
            uid: "abc".to_string(),
            atype: None,
            expires_in: None,
            extra: Map::new(),
        };
        let record = IdentityRecord::from_response(&response, i64::MAX - 1, i64::MAX, i64::MAX);
        assert_eq!(record.expires_at, Some(i64::MAX));
        assert_eq!(record.rotate_at, Some(i64::MAX));
    }
}
