//! Binds one store to one decoder.

use std::sync::Arc;

use crate::decoder::Decoder;
use crate::document::Document;
use crate::error::{ConfigError, SourceError};
use crate::options::SourceSpec;
use crate::store::{Registry, Store};

/// Produces one [`Document`] per tick from a store and its decoder.
pub struct SourceProvider {
    label: String,
    format: String,
    store: Box<dyn Store>,
    decoder: Arc<dyn Decoder>,
    options: Document,
    optional: bool,
}

impl SourceProvider {
    /// Builds the store and resolves the decoder. Unknown store types,
    /// unknown formats and missing store options fail here.
    pub fn new(spec: &SourceSpec, registry: &Registry) -> Result<Self, ConfigError> {
        let factory = registry.store_factory(&spec.store_type)?;
        let decoder = registry.decoders().require(&spec.format)?;
        let store = factory.create(&spec.options, registry.decoders())?;

        Ok(Self {
            label: spec.store_type.clone(),
            format: spec.format.clone(),
            store,
            decoder,
            options: spec.options.clone(),
            optional: spec.optional,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Fetches and decodes. Failures of an optional source yield an empty
    /// document instead of an error.
    pub async fn fetch(&self) -> Result<Document, SourceError> {
        let bytes = match self.store.fetch().await {
            Ok(bytes) => bytes,
            Err(e) if self.optional => {
                tracing::debug!(
                    "Unable to retrieve the configuration from the optional '{}' source: {}",
                    self.label,
                    e
                );
                return Ok(Document::new());
            }
            Err(e) => {
                return Err(SourceError::Fetch {
                    source_name: self.label.clone(),
                    error: e,
                })
            }
        };

        match self.decoder.decode(&self.options, &bytes) {
            Ok(document) => Ok(document),
            Err(e) if self.optional => {
                tracing::warn!(
                    "Unable to process the configuration of the optional '{}' source: {}",
                    self.label,
                    e
                );
                Ok(Document::new())
            }
            Err(e) => Err(SourceError::Decode {
                source_name: self.label.clone(),
                error: e,
            }),
        }
    }

    pub fn release(&self) {
        self.store.release();
    }
}

impl std::fmt::Debug for SourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceProvider")
            .field("label", &self.label)
            .field("format", &self.format)
            .field("optional", &self.optional)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
