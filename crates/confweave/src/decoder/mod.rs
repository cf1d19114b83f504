pub mod json;
pub mod properties;
pub mod raw;
pub mod yaml;

use std::collections::HashMap;
use std::sync::Arc;

use crate::document::Document;
use crate::error::{ConfigError, DecodeError};

/// Turns the bytes fetched by a store into a [`Document`].
pub trait Decoder: Send + Sync {
    /// The format name used to look the decoder up.
    fn name(&self) -> &str;

    /// Decodes `input`. `options` are the per-source (or per-file-set)
    /// options, passed through verbatim.
    fn decode(&self, options: &Document, input: &[u8]) -> Result<Document, DecodeError>;
}

/// Format name to decoder map. Read-only once built.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `json`, `yaml`, `properties` and `raw` decoders.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(json::JsonDecoder));
        registry.register(Arc::new(yaml::YamlDecoder));
        registry.register(Arc::new(properties::PropertiesDecoder));
        registry.register(Arc::new(raw::RawDecoder));
        registry
    }

    /// Adds a decoder, replacing any previous one with the same name.
    pub fn register(&mut self, decoder: Arc<dyn Decoder>) {
        if let Some(previous) = self.decoders.insert(decoder.name().to_string(), decoder) {
            log::debug!("Replaced the decoder for format '{}'", previous.name());
        }
    }

    pub fn get(&self, format: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(format).cloned()
    }

    /// Looks up a decoder, failing with the list of supported formats.
    pub fn require(&self, format: &str) -> Result<Arc<dyn Decoder>, ConfigError> {
        self.get(format).ok_or_else(|| ConfigError::UnknownFormat {
            name: format.to_string(),
            known: self.supported_formats().join(", "),
        })
    }

    /// Sorted list of registered format names.
    pub fn supported_formats(&self) -> Vec<String> {
        let mut names: Vec<String> = self.decoders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formats", &self.supported_formats())
            .finish()
    }
}
