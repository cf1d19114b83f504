//! Glob-selected, deep-merged groups of files under one root directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::Instrument;
use walkdir::WalkDir;

use crate::decoder::{Decoder, DecoderRegistry};
use crate::document::{merge_into, Document};
use crate::error::{ConfigError, StoreError};
use crate::glob;
use crate::options::FileSetSpec;

/// A glob pattern and a decoder bound to a root directory.
pub struct FileSet {
    root: PathBuf,
    pattern: String,
    format: String,
    decoder: Arc<dyn Decoder>,
    decoder_options: Document,
}

impl FileSet {
    /// Binds `spec` to `root`. Fails when the pattern is empty or the format
    /// is not registered.
    pub fn new(
        root: impl Into<PathBuf>,
        spec: &FileSetSpec,
        decoders: &DecoderRegistry,
    ) -> Result<Self, ConfigError> {
        if spec.pattern.is_empty() {
            return Err(ConfigError::MissingOption {
                store: "directory".to_string(),
                option: "pattern".to_string(),
            });
        }
        let decoder = decoders.require(&spec.format)?;

        Ok(Self {
            root: root.into(),
            pattern: spec.pattern.clone(),
            format: spec.format.clone(),
            decoder,
            decoder_options: spec.decoder_options(),
        })
    }

    /// Paths of `files` relative to the root that match the pattern, sorted.
    ///
    /// Files outside the root are skipped with a warning.
    pub fn select(&self, files: &[PathBuf]) -> Vec<(String, PathBuf)> {
        let mut selected: Vec<(String, PathBuf)> = files
            .iter()
            .filter_map(|file| match file.strip_prefix(&self.root) {
                Ok(relative) => Some((normalize(relative), file.clone())),
                Err(_) => {
                    tracing::warn!(
                        "File {} is not under the root directory {}, ignoring it",
                        file.display(),
                        self.root.display()
                    );
                    None
                }
            })
            .filter(|(relative, _)| glob::matches(&self.pattern, relative, false))
            .collect();

        selected.sort_by(|a, b| a.0.cmp(&b.0));
        selected
    }

    /// Reads and decodes every selected file concurrently, then deep-merges
    /// the results in relative-path order. Any failure fails the whole build.
    pub async fn build(&self, files: &[PathBuf]) -> Result<Document, StoreError> {
        let span = tracing::info_span!("fileset", pattern = %self.pattern, format = %self.format);
        async {
            let selected = self.select(files);
            tracing::debug!("{} file(s) matched", selected.len());

            let decoded = join_all(
                selected
                    .iter()
                    .map(|(_, path)| self.read_and_decode(path)),
            )
            .await;

            let mut merged = Document::new();
            for document in decoded {
                merge_into(&mut merged, &document?, true);
            }
            Ok::<_, StoreError>(merged)
        }
        .instrument(span)
        .await
    }

    async fn read_and_decode(&self, path: &Path) -> Result<Document, StoreError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;

        self.decoder
            .decode(&self.decoder_options, &bytes)
            .map_err(|e| StoreError::DecodeFile {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

/// Lists every regular file under `root`, recursively, in file-name order.
pub fn traverse(root: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::Traversal {
            path: root.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Joins path components with `/` so patterns behave the same on every platform.
fn normalize(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn json_set(root: &Path, pattern: &str) -> FileSet {
        FileSet::new(root, &FileSetSpec::new(pattern), &DecoderRegistry::builtin()).unwrap()
    }

    #[tokio::test]
    async fn test_later_file_wins_regardless_of_input_order() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.json", r#"{"k": "A", "only_a": 1}"#);
        let b = write(temp.path(), "b.json", r#"{"k": "B"}"#);
        let set = json_set(temp.path(), "*.json");

        let forward = set.build(&[a.clone(), b.clone()]).await.unwrap();
        let reverse = set.build(&[b, a]).await.unwrap();

        assert_eq!(forward.get_str("k"), Some("B"));
        assert_eq!(forward.get_i64("only_a"), Some(1));
        assert_eq!(forward, reverse);
    }

    #[tokio::test]
    async fn test_star_spans_directories() {
        let temp = TempDir::new().unwrap();
        let top = write(temp.path(), "dir/a.json", r#"{"top": true}"#);
        let nested = write(temp.path(), "dir/sub/a.json", r#"{"nested": true}"#);
        let other = write(temp.path(), "other/c.json", r#"{"other": true}"#);
        let set = json_set(temp.path(), "dir/*.json");

        let doc = set.build(&[top, nested, other]).await.unwrap();
        assert_eq!(doc.get_bool("top"), Some(true));
        assert_eq!(doc.get_bool("nested"), Some(true));
        assert!(doc.get("other").is_none());
    }

    #[tokio::test]
    async fn test_pattern_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let file = write(temp.path(), "App.JSON", r#"{"x": 1}"#);
        let doc = json_set(temp.path(), "app.json").build(&[file]).await.unwrap();
        assert_eq!(doc.get_i64("x"), Some(1));
    }

    #[tokio::test]
    async fn test_files_outside_root_are_ignored() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let inside = write(root.path(), "in.json", r#"{"in": 1}"#);
        let outside = write(elsewhere.path(), "out.json", r#"{"out": 1}"#);

        let doc = json_set(root.path(), "*").build(&[inside, outside]).await.unwrap();
        assert_eq!(doc.get_i64("in"), Some(1));
        assert!(doc.get("out").is_none());
    }

    #[tokio::test]
    async fn test_decode_failure_fails_build() {
        let temp = TempDir::new().unwrap();
        let good = write(temp.path(), "a.json", r#"{"ok": true}"#);
        let bad = write(temp.path(), "b.json", "{ not json");

        let result = json_set(temp.path(), "*.json").build(&[good, bad]).await;
        assert!(matches!(result, Err(StoreError::DecodeFile { path, .. }) if path.ends_with("b.json")));
    }

    #[tokio::test]
    async fn test_missing_file_fails_build() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("gone.json");
        let result = json_set(temp.path(), "*.json").build(&[missing]).await;
        assert!(matches!(result, Err(StoreError::ReadFile { .. })));
    }

    #[tokio::test]
    async fn test_properties_options_pass_through() {
        let temp = TempDir::new().unwrap();
        let file = write(temp.path(), "app.properties", "server.port=8080\n");
        let spec = FileSetSpec {
            pattern: "*.properties".to_string(),
            format: "properties".to_string(),
            raw_data: false,
            hierarchical: true,
        };
        let set = FileSet::new(temp.path(), &spec, &DecoderRegistry::builtin()).unwrap();

        let doc = set.build(&[file]).await.unwrap();
        let server = doc.get_document("server").unwrap();
        assert_eq!(server.get_i64("port"), Some(8080));
    }

    #[test]
    fn test_unknown_format_rejected_eagerly() {
        let spec = FileSetSpec::new("*.toml").with_format("toml");
        let result = FileSet::new("/tmp", &spec, &DecoderRegistry::builtin());
        assert!(matches!(result, Err(ConfigError::UnknownFormat { .. })));
    }

    #[test]
    fn test_empty_pattern_rejected_eagerly() {
        let result = FileSet::new("/tmp", &FileSetSpec::new(""), &DecoderRegistry::builtin());
        assert!(matches!(result, Err(ConfigError::MissingOption { .. })));
    }

    #[test]
    fn test_traverse_is_recursive_and_sorted() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "b.json", "{}");
        write(temp.path(), "a/z.json", "{}");
        write(temp.path(), "a.json", "{}");

        let files: Vec<String> = traverse(temp.path())
            .unwrap()
            .iter()
            .map(|p| normalize(p.strip_prefix(temp.path()).unwrap()))
            .collect();
        assert_eq!(files, vec!["a/z.json", "a.json", "b.json"]);
    }

    #[test]
    fn test_traverse_missing_root() {
        let result = traverse(Path::new("/nonexistent/confweave-root"));
        assert!(matches!(result, Err(StoreError::Traversal { .. })));
    }
}
