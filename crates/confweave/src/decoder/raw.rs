use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use super::Decoder;
use crate::document::Document;
use crate::error::DecodeError;

/// Wraps the whole payload under a single key.
///
/// Options: `raw.key` (required), `raw.type` (`string`, `json-object`,
/// `json-array` or `binary`; defaults to `string`) and `raw.encoding`
/// (only `utf-8` is supported).
pub struct RawDecoder;

impl Decoder for RawDecoder {
    fn name(&self) -> &str {
        "raw"
    }

    fn decode(&self, options: &Document, input: &[u8]) -> Result<Document, DecodeError> {
        let key = options.get_str("raw.key").ok_or_else(|| {
            DecodeError::Raw(
                "the `raw.key` option is required when using the `raw` format".to_string(),
            )
        })?;
        let kind = options.get_str("raw.type").unwrap_or("string");

        let value = match kind {
            "string" => {
                let encoding = options.get_str("raw.encoding").unwrap_or("utf-8");
                if !encoding.eq_ignore_ascii_case("utf-8") && !encoding.eq_ignore_ascii_case("utf8") {
                    return Err(DecodeError::Raw(format!(
                        "unsupported `raw.encoding`: {}",
                        encoding
                    )));
                }
                Value::String(String::from_utf8(input.to_vec())?)
            }
            "json-object" => match serde_json::from_slice::<Value>(input)? {
                obj @ Value::Object(_) => obj,
                _ => {
                    return Err(DecodeError::NotAnObject {
                        format: "json".to_string(),
                    })
                }
            },
            "json-array" => match serde_json::from_slice::<Value>(input)? {
                arr @ Value::Array(_) => arr,
                _ => {
                    return Err(DecodeError::Raw(
                        "expected a JSON array payload".to_string(),
                    ))
                }
            },
            "binary" => Value::String(STANDARD.encode(input)),
            other => {
                return Err(DecodeError::Raw(format!("unrecognized `raw.type`: {}", other)));
            }
        };

        Ok(Document::new().with(key, value))
    }
}
