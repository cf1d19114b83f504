//! Builders for source specs used across integration tests.

#![allow(dead_code)]

use std::path::Path;

use serde_json::{json, Value};

use confweave::{Document, EngineConfig, SourceSpec};

/// A `json` source serving `value`.
pub fn inline_source(value: Value) -> SourceSpec {
    SourceSpec::new("json").with_options(Document::from_value(value).expect("object expected"))
}

/// A `file` source reading `path` with `format`.
pub fn file_source(path: &Path, format: &str) -> SourceSpec {
    SourceSpec::new("file")
        .with_format(format)
        .with_options(Document::new().with("path", path.to_string_lossy().to_string()))
}

/// A `directory` source over `root` with the given file sets.
pub fn directory_source(root: &Path, filesets: Value) -> SourceSpec {
    SourceSpec::new("directory").with_options(
        Document::from_value(json!({
            "path": root.to_string_lossy(),
            "filesets": filesets,
        }))
        .expect("object expected"),
    )
}

/// Engine config with the given sources and polling disabled.
pub fn single_shot(sources: Vec<SourceSpec>) -> EngineConfig {
    sources
        .into_iter()
        .fold(EngineConfig::new().with_poll_interval_millis(0), |config, source| {
            config.with_source(source)
        })
}
