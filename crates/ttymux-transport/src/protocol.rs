//! Wire protocol for bus messages.
//!
//! Messages travel as JSON objects:
//! `{ "kind": "output", "unit": 2, "payload": "A", "origin": "...", "timestamp": 17 }`.
//! Device bytes map one-to-one onto the characters `U+0000..=U+00FF`.

use ttymux_core::Message;

/// Codec error.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a message to its JSON wire form.
///
/// # Errors
/// Returns error if serialization fails.
pub fn encode(msg: &Message) -> Result<String, CodecError> {
    Ok(serde_json::to_string(msg)?)
}

/// Parse a message from its JSON wire form.
///
/// # Errors
/// Returns error on malformed JSON, unknown kinds or missing fields.
pub fn decode(text: &str) -> Result<Message, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Map device bytes to payload characters.
#[must_use]
pub fn bytes_to_payload(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Map payload characters back to device bytes.
///
/// Characters outside `U+0000..=U+00FF` become `?`.
#[must_use]
pub fn payload_to_bytes(payload: &str) -> Vec<u8> {
    payload
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_ok;
    use ttymux_core::{MessageKind, Origin};

    use super::*;

    #[test]
    fn test_wire_shape() {
        let msg = Message {
            kind: MessageKind::Output,
            unit: 2,
            payload: Some("A".into()),
            origin: Origin::from_raw("ctx-1"),
            timestamp: 17,
        };
        let value: serde_json::Value = serde_json::from_str(&encode(&msg).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "kind": "output",
                "unit": 2,
                "payload": "A",
                "origin": "ctx-1",
                "timestamp": 17
            })
        );
    }

    #[test]
    fn test_omitted_payload() {
        let msg = assert_ok!(decode(r#"{"kind":"ping","unit":-1,"origin":"x","timestamp":0}"#));
        assert_eq!(msg.kind, MessageKind::Ping);
        assert!(msg.is_broadcast());
        assert_eq!(msg.payload, None);
        assert!(!encode(&msg).unwrap().contains("payload"));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let err = decode(r#"{"kind":"resize","unit":1,"origin":"x","timestamp":0}"#);
        assert!(matches!(err, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_payload_byte_mapping() {
        let bytes = [0x41, 0x0d, 0x0a, 0xff];
        let payload = bytes_to_payload(&bytes);
        assert_eq!(payload.chars().count(), 4);
        assert_eq!(payload_to_bytes(&payload), bytes);
        assert_eq!(payload_to_bytes("a€b"), b"a?b");
    }
}
