//! Decoded identity values and their eids representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier pairing passed on to bid requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdplusId {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub atype: Option<i64>,
}

/// Output of `decode`: `{"adplusId": {"id": .., "atype": ..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedId {
    #[serde(rename = "adplusId")]
    pub adplus_id: AdplusId,
}

/// Normalize a stored or fetched value. Anything but a JSON object yields `None`.
#[must_use]
pub fn decode(value: &Value) -> Option<DecodedId> {
    let object = value.as_object()?;
    Some(DecodedId {
        adplus_id: AdplusId {
            id: object.get("uid").and_then(Value::as_str).map(str::to_string),
            atype: object.get("atype").and_then(Value::as_i64),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EidUid {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub atype: Option<i64>,
}

/// One entry of the cross-vendor external identifier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eid {
    pub source: String,
    pub uids: Vec<EidUid>,
}

/// Group decoded values under a single eid entry for `source`.
#[must_use]
pub fn eids(source: &str, values: &[AdplusId]) -> Vec<Eid> {
    vec![Eid {
        source: source.to_string(),
        uids: values
            .iter()
            .map(|value| EidUid {
                id: value.id.clone(),
                atype: value.atype,
            })
            .collect(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const UID: &str = "v2|n_vl-BK185ZwF5Egm5UafsRms9mF6LTWpfWkTHmoRsz0Bh5hTWvfiJWD6nq_9g05OwNVG2pSTTTfwg";

    #[test]
    fn test_decode_object() {
        let decoded = decode(&json!({"uid": UID, "atype": 2, "expiresIn": 7_776_000}))
            .expect("object should decode");
        assert_eq!(
            serde_json::to_value(&decoded).expect("json"),
            json!({"adplusId": {"id": UID, "atype": 2}})
        );
    }

    #[test]
    fn test_decode_non_objects() {
        assert_eq!(decode(&json!(1)), None);
        assert_eq!(decode(&Value::Null), None);
        assert_eq!(decode(&json!("abc")), None);
        assert_eq!(decode(&json!([{"uid": UID}])), None);
    }

    #[test]
    fn test_decode_object_without_uid() {
        let decoded = decode(&json!({})).expect("object should decode");
        assert_eq!(
            serde_json::to_value(&decoded).expect("json"),
            json!({"adplusId": {}})
        );
    }

    #[test]
    fn test_eids_single_value() {
        let decoded = decode(&json!({"uid": UID, "atype": 2})).expect("should decode");
        let eids = eids("ad-plus.com.tr", &[decoded.adplus_id]);
        assert_eq!(
            serde_json::to_value(&eids).expect("json"),
            json!([{"source": "ad-plus.com.tr", "uids": [{"id": UID, "atype": 2}]}])
        );
    }

    #[test]
    fn test_eids_multiple_values_share_one_source() {
        let values = vec![
            AdplusId {
                id: Some("a".to_string()),
                atype: Some(1),
            },
            AdplusId {
                id: Some("b".to_string()),
                atype: Some(3),
            },
        ];
        let eids = eids("ad-plus.com.tr", &values);
        assert_eq!(eids.len(), 1);
        assert_eq!(eids[0].uids.len(), 2);
        assert_eq!(eids[0].uids[1].id.as_deref(), Some("b"));
    }
}
