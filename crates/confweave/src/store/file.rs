use std::path::PathBuf;

use super::{required_str, Store, StoreFactory};
use crate::decoder::DecoderRegistry;
use crate::document::Document;
use crate::error::{ConfigError, StoreError};

/// Reads a single file. Option: `path` (required).
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Store for FileStore {
    async fn fetch(&self) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| StoreError::ReadFile {
                path: self.path.clone(),
                source: e,
            })
    }
}

pub struct FileStoreFactory;

impl StoreFactory for FileStoreFactory {
    fn name(&self) -> &str {
        "file"
    }

    fn create(
        &self,
        options: &Document,
        _decoders: &DecoderRegistry,
    ) -> Result<Box<dyn Store>, ConfigError> {
        let path = required_str(options, "file", "path")?;
        Ok(Box::new(FileStore::new(path)))
    }
}
