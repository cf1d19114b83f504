//! Merges the file sets of a directory tree into one JSON payload.

use std::path::PathBuf;

use futures_util::future::join_all;
use serde_json::Value;

use super::{required_str, Store, StoreFactory};
use crate::decoder::DecoderRegistry;
use crate::document::{merge_into, Document};
use crate::error::{ConfigError, StoreError};
use crate::fileset::{self, FileSet};
use crate::options::FileSetSpec;

/// Walks `path` recursively and merges every file set, in declaration order.
///
/// The payload is JSON, so sources using this store keep the `json` format.
/// A missing root yields an empty document.
pub struct DirectoryStore {
    root: PathBuf,
    filesets: Vec<FileSet>,
}

impl DirectoryStore {
    pub fn new(root: PathBuf, filesets: Vec<FileSet>) -> Self {
        Self {
            root,
            filesets,
        }
    }
}

#[async_trait::async_trait]
impl Store for DirectoryStore {
    async fn fetch(&self) -> Result<Vec<u8>, StoreError> {
        if !self.root.exists() {
            tracing::debug!("Directory {} does not exist", self.root.display());
            return Ok(Document::new().to_json_bytes()?);
        }

        let root = self.root.clone();
        let files = tokio::task::spawn_blocking(move || fileset::traverse(&root))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;

        let built = join_all(self.filesets.iter().map(|set| set.build(&files))).await;

        let mut merged = Document::new();
        for document in built {
            merge_into(&mut merged, &document?, true);
        }
        Ok(merged.to_json_bytes()?)
    }
}

pub struct DirectoryStoreFactory;

impl StoreFactory for DirectoryStoreFactory {
    fn name(&self) -> &str {
        "directory"
    }

    fn create(
        &self,
        options: &Document,
        decoders: &DecoderRegistry,
    ) -> Result<Box<dyn Store>, ConfigError> {
        let root = PathBuf::from(required_str(options, "directory", "path")?);
        if root.is_file() {
            return Err(ConfigError::InvalidOption {
                store: "directory".to_string(),
                option: "path".to_string(),
                reason: format!("{} is a file, a directory is expected", root.display()),
            });
        }

        let specs = match options.get("filesets") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ConfigError::InvalidOption {
                    store: "directory".to_string(),
                    option: "filesets".to_string(),
                    reason: "expected an array of file sets".to_string(),
                })
            }
            None => {
                return Err(ConfigError::MissingOption {
                    store: "directory".to_string(),
                    option: "filesets".to_string(),
                })
            }
        };

        let mut filesets = Vec::with_capacity(specs.len());
        for item in specs {
            let doc = Document::from_value(item.clone()).ok_or_else(|| ConfigError::InvalidOption {
                store: "directory".to_string(),
                option: "filesets".to_string(),
                reason: format!("expected an object, found {}", item),
            })?;
            let spec = FileSetSpec::from_document(&doc)?;
            filesets.push(FileSet::new(root.clone(), &spec, decoders)?);
        }

        Ok(Box::new(DirectoryStore::new(root, filesets)))
    }
}
