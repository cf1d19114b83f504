pub mod directory;
pub mod env;
pub mod file;
pub mod http;
pub mod json;

use std::collections::HashMap;
use std::sync::Arc;

use crate::decoder::{Decoder, DecoderRegistry};
use crate::document::Document;
use crate::error::{ConfigError, StoreError};

/// Obtains the raw bytes of one configuration source.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, StoreError>;

    /// Releases held resources. Must be idempotent.
    fn release(&self) {}
}

/// Builds a [`Store`] from a source's options.
pub trait StoreFactory: Send + Sync {
    /// The store type name used in `SourceSpec::store_type`.
    fn name(&self) -> &str;

    /// Validates `options` and builds the store. Missing required options
    /// fail here, never at fetch time.
    fn create(
        &self,
        options: &Document,
        decoders: &DecoderRegistry,
    ) -> Result<Box<dyn Store>, ConfigError>;
}

/// Store factories and decoders, looked up by name. Read-only once built and
/// shared by every engine that holds it.
#[derive(Clone, Default)]
pub struct Registry {
    stores: HashMap<String, Arc<dyn StoreFactory>>,
    decoders: DecoderRegistry,
}

impl Registry {
    /// Registry with the built-in stores and decoders.
    pub fn builtin() -> Self {
        Self::builder().with_builtin().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    /// Looks up a store factory, failing with the list of known stores.
    pub fn store_factory(&self, name: &str) -> Result<Arc<dyn StoreFactory>, ConfigError> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownStore {
                name: name.to_string(),
                known: self.store_types().join(", "),
            })
    }

    /// Sorted list of registered store types.
    pub fn store_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("stores", &self.store_types())
            .field("decoders", &self.decoders)
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Adds the `file`, `directory`, `json`, `env` and `http` stores and
    /// the built-in decoders.
    pub fn with_builtin(mut self) -> Self {
        let builtin = DecoderRegistry::builtin();
        for format in builtin.supported_formats() {
            if let Some(decoder) = builtin.get(&format) {
                self.registry.decoders.register(decoder);
            }
        }
        self.store(Arc::new(file::FileStoreFactory))
            .store(Arc::new(directory::DirectoryStoreFactory))
            .store(Arc::new(json::JsonStoreFactory))
            .store(Arc::new(env::EnvStoreFactory))
            .store(Arc::new(http::HttpStoreFactory))
    }

    /// Registers a store factory, replacing one with the same name.
    pub fn store(mut self, factory: Arc<dyn StoreFactory>) -> Self {
        if let Some(previous) = self
            .registry
            .stores
            .insert(factory.name().to_string(), factory)
        {
            log::debug!("Replaced the store factory '{}'", previous.name());
        }
        self
    }

    /// Registers a decoder, replacing one with the same name.
    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.registry.decoders.register(decoder);
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

/// Reads a required string option.
pub(crate) fn required_str<'a>(
    options: &'a Document,
    store: &str,
    option: &str,
) -> Result<&'a str, ConfigError> {
    options.get_str(option).ok_or_else(|| ConfigError::MissingOption {
        store: store.to_string(),
        option: option.to_string(),
    })
}
