use serde_json::Value;

use super::Decoder;
use crate::document::Document;
use crate::error::DecodeError;

/// Decodes a YAML mapping into a document.
pub struct YamlDecoder;

impl Decoder for YamlDecoder {
    fn name(&self) -> &str {
        "yaml"
    }

    fn decode(&self, _options: &Document, input: &[u8]) -> Result<Document, DecodeError> {
        // serde_yaml rejects an empty stream; treat it as an empty document.
        if input.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        match serde_yaml::from_slice::<Value>(input)? {
            Value::Null => Ok(Document::new()),
            Value::Object(map) => Ok(Document::from(map)),
            _ => Err(DecodeError::NotAnObject {
                format: "yaml".to_string(),
            }),
        }
    }
}
