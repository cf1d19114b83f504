use super::{Store, StoreFactory};
use crate::decoder::DecoderRegistry;
use crate::document::Document;
use crate::error::{ConfigError, StoreError};

/// Serves its own options as the configuration.
pub struct JsonStore {
    payload: Document,
}

impl JsonStore {
    pub fn new(payload: Document) -> Self {
        Self { payload }
    }
}

#[async_trait::async_trait]
impl Store for JsonStore {
    async fn fetch(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.payload.to_json_bytes()?)
    }
}

pub struct JsonStoreFactory;

impl StoreFactory for JsonStoreFactory {
    fn name(&self) -> &str {
        "json"
    }

    fn create(
        &self,
        options: &Document,
        _decoders: &DecoderRegistry,
    ) -> Result<Box<dyn Store>, ConfigError> {
        Ok(Box::new(JsonStore::new(options.clone())))
    }
}
