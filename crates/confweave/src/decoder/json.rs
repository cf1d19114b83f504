use serde_json::Value;

use super::Decoder;
use crate::document::Document;
use crate::error::DecodeError;

/// Decodes a JSON object. Empty input and `null` decode to an empty document.
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn name(&self) -> &str {
        "json"
    }

    fn decode(&self, _options: &Document, input: &[u8]) -> Result<Document, DecodeError> {
        if input.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        match serde_json::from_slice::<Value>(input)? {
            Value::Null => Ok(Document::new()),
            Value::Object(map) => Ok(Document::from(map)),
            _ => Err(DecodeError::NotAnObject {
                format: "json".to_string(),
            }),
        }
    }
}
