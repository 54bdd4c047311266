//! Frame encoding and decoding.
//!
//! A frame is the serialized JSON document followed by [`FRAME_DELIMITER`].
//! JSON escapes control characters inside strings, so a serialized document
//! never contains a raw NUL and the delimiter is unambiguous.

use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// Byte terminating every frame.
pub const FRAME_DELIMITER: u8 = 0;

/// Largest inbound frame, delimiter included. Also the size of the scratch
/// buffer a single receive operation fills.
pub const MAX_FRAME_SIZE: usize = 256;

/// Largest outbound frame, delimiter included. Also the capacity of a pooled
/// outbound message buffer.
pub const MAX_OUTBOUND_SIZE: usize = 1024;

/// Serialize `document` and append the delimiter.
///
/// # Errors
///
/// - `ProtocolError::FrameTooLarge` if the encoded frame exceeds
///   [`MAX_OUTBOUND_SIZE`]
/// - `ProtocolError::Encode` if serialization fails
pub fn encode_frame(document: &Value) -> Result<Vec<u8>> {
    let mut bytes =
        serde_json::to_vec(document).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    bytes.push(FRAME_DELIMITER);

    if bytes.len() > MAX_OUTBOUND_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: bytes.len(), max: MAX_OUTBOUND_SIZE });
    }

    Ok(bytes)
}

/// Parse one frame. A trailing delimiter is accepted and ignored.
///
/// # Errors
///
/// - `ProtocolError::FrameTooLarge` if `frame` exceeds [`MAX_FRAME_SIZE`]
/// - `ProtocolError::Malformed` if the bytes are not a JSON document
pub fn decode_frame(frame: &[u8]) -> Result<Value> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: frame.len(), max: MAX_FRAME_SIZE });
    }

    let body = frame.strip_suffix(&[FRAME_DELIMITER]).unwrap_or(frame);
    serde_json::from_slice(body).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn encode_appends_single_delimiter() {
        let bytes = encode_frame(&json!({"type": "echo"})).unwrap();

        assert_eq!(bytes.last(), Some(&FRAME_DELIMITER));
        assert_eq!(bytes.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
    }

    #[test]
    fn embedded_nul_in_string_is_escaped() {
        let bytes = encode_frame(&json!({"type": "echo", "text": "a\u{0}b"})).unwrap();

        assert_eq!(bytes.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
        assert_eq!(decode_frame(&bytes).unwrap()["text"], "a\u{0}b");
    }

    #[test]
    fn encode_rejects_oversized_document() {
        let text = "x".repeat(MAX_OUTBOUND_SIZE);
        let result = encode_frame(&json!({ "type": "echo", "text": text }));

        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { max: MAX_OUTBOUND_SIZE, .. })));
    }

    #[test]
    fn decode_without_delimiter() {
        let value = decode_frame(br#"{"type":"echo","x":1}"#).unwrap();
        assert_eq!(value, json!({"type": "echo", "x": 1}));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = decode_frame(b"{not json\0");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn decode_rejects_oversized_frame() {
        let frame = vec![b' '; MAX_FRAME_SIZE + 1];
        let result = decode_frame(&frame);

        assert_eq!(
            result,
            Err(ProtocolError::FrameTooLarge { size: MAX_FRAME_SIZE + 1, max: MAX_FRAME_SIZE })
        );
    }
}
