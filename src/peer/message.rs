use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ "type": ..., "data": ... }` as carried on the data channel.
/// `data` is left out for zero-payload message types.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageEnvelope<T = Value> {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> MessageEnvelope<T> {
    pub fn new(kind: impl Into<String>, data: T) -> Self {
        Self {
            kind: kind.into(),
            data: Some(data),
        }
    }

    /// Envelope without payload, e.g. `{"type":"ping"}`.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: None,
        }
    }
}

pub fn encode<T: Serialize>(envelope: &MessageEnvelope<T>) -> Result<String, serde_json::Error> {
    serde_json::to_string(envelope)
}

/// Parse channel text into an untyped envelope.
pub fn decode(text: &str) -> Result<MessageEnvelope, DecodeError> {
    let mut value: Value = serde_json::from_str(text)?;
    let object = value.as_object_mut().ok_or(DecodeError::NotAnObject)?;

    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(DecodeError::MissingType),
    };
    // absent and explicit null are different payloads
    let data = object.remove("data");

    Ok(MessageEnvelope { kind, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_envelope_omits_data() {
        let text = encode(&MessageEnvelope::<()>::bare("ping")).unwrap();
        assert_eq!(text, r#"{"type":"ping"}"#);
        assert_eq!(decode(&text).unwrap(), MessageEnvelope::bare("ping"));
    }

    #[test]
    fn typed_payload_round_trips() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Cursor {
            x: i32,
            y: i32,
        }

        let sent = MessageEnvelope::new("cursor", Cursor { x: 3, y: -7 });
        let got = decode(&encode(&sent).unwrap()).unwrap();
        assert_eq!(got.kind, "cursor");
        let data: Cursor = serde_json::from_value(got.data.unwrap()).unwrap();
        assert_eq!(data, Cursor { x: 3, y: -7 });
    }

    #[test]
    fn arbitrary_json_payloads_round_trip() {
        for data in [json!("hello"), json!(42), json!([1, "two", {"three": 3}]), json!({"nested": {"a": [true, false]}})] {
            let sent = MessageEnvelope::new("text-message", data);
            assert_eq!(decode(&encode(&sent).unwrap()).unwrap(), sent);
        }
    }

    #[test]
    fn null_payload_stays_distinct_from_missing_data() {
        let sent = MessageEnvelope::new("nullable", json!(null));
        let text = encode(&sent).unwrap();
        assert_eq!(text, r#"{"type":"nullable","data":null}"#);
        assert_eq!(decode(&text).unwrap(), sent);
        assert_eq!(decode(r#"{"type":"nullable"}"#).unwrap().data, None);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(decode("{not json"), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(decode("[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode("\"ping\""), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn rejects_missing_or_non_string_type() {
        assert!(matches!(decode(r#"{"data":1}"#), Err(DecodeError::MissingType)));
        assert!(matches!(decode(r#"{"type":7}"#), Err(DecodeError::MissingType)));
    }
}
