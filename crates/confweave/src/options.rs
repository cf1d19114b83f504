//! Engine, source and file-set options, and loading them from disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../schema/engine-config-v1.json");

/// Default scan period, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MILLIS: i64 = 5000;

/// Environment variable naming the default configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFWEAVE_CONFIG_PATH";

const DEFAULT_CONFIG_PATH: &str = "conf/config.json";

fn default_format() -> String {
    "json".to_string()
}

fn default_poll_interval() -> i64 {
    DEFAULT_POLL_INTERVAL_MILLIS
}

/// One configuration source: a store type, the format of its bytes, and
/// options passed verbatim to the store and decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub store_type: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, alias = "config")]
    pub options: Document,
    /// Failures of an optional source contribute an empty document.
    #[serde(default)]
    pub optional: bool,
}

impl SourceSpec {
    pub fn new(store_type: impl Into<String>) -> Self {
        Self {
            store_type: store_type.into(),
            format: default_format(),
            options: Document::new(),
            optional: false,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_options(mut self, options: Document) -> Self {
        self.options = options;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }
}

/// A glob pattern plus decoding options, evaluated against a directory root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSetSpec {
    pub pattern: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, rename = "raw-data")]
    pub raw_data: bool,
    #[serde(default)]
    pub hierarchical: bool,
}

impl FileSetSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            format: default_format(),
            raw_data: false,
            hierarchical: false,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Parses one entry of a directory store's `filesets` option.
    pub fn from_document(doc: &Document) -> Result<Self, ConfigError> {
        if doc.get_str("pattern").is_none() {
            return Err(ConfigError::MissingOption {
                store: "directory".to_string(),
                option: "pattern".to_string(),
            });
        }
        serde_json::from_value(doc.clone().into_value()).map_err(|e| ConfigError::InvalidOption {
            store: "directory".to_string(),
            option: "filesets".to_string(),
            reason: e.to_string(),
        })
    }

    /// Options handed to the decoder for every file of the set.
    pub fn decoder_options(&self) -> Document {
        Document::new()
            .with("raw-data", self.raw_data)
            .with("hierarchical", self.hierarchical)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sources in overlay order: later sources win.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Scan period; `<= 0` disables periodic scanning.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: i64,
    #[serde(default)]
    pub include_default_stores: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            poll_interval_millis: DEFAULT_POLL_INTERVAL_MILLIS,
            include_default_stores: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: SourceSpec) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_poll_interval_millis(mut self, millis: i64) -> Self {
        self.poll_interval_millis = millis;
        self
    }

    pub fn with_default_stores(mut self, include: bool) -> Self {
        self.include_default_stores = include;
        self
    }

    /// The sources the engine actually builds, default stores first.
    pub fn effective_sources(&self) -> Vec<SourceSpec> {
        if !self.include_default_stores {
            return self.sources.clone();
        }
        let mut sources = default_sources(default_config_path());
        sources.extend(self.sources.iter().cloned());
        sources
    }
}

/// Serialization format of an engine config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFileFormat {
    Json,
    Yaml,
}

impl ConfigFileFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFileFormat::Yaml
            }
            _ => ConfigFileFormat::Json,
        }
    }
}

pub fn load_engine_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_engine_config_from_str(&content, ConfigFileFormat::from_path(path))
}

pub fn load_engine_config_from_str(
    content: &str,
    format: ConfigFileFormat,
) -> Result<EngineConfig, ConfigError> {
    let json_value: serde_json::Value = match format {
        ConfigFileFormat::Json => serde_json::from_str(content)?,
        ConfigFileFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&json_value)?;

    let config: EngineConfig = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    for (index, source) in config.sources.iter().enumerate() {
        if source.store_type.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("source #{} has an empty `type`", index),
            });
        }
        if source.format.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("source #{} has an empty `format`", index),
            });
        }
    }
    Ok(())
}

/// Resolves the default configuration file: the `CONFWEAVE_CONFIG_PATH`
/// variable when set, otherwise `conf/config.json` if it exists.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(value) = std::env::var(CONFIG_PATH_ENV) {
        let value = value.trim();
        if !value.is_empty() {
            return Some(PathBuf::from(value));
        }
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    fallback.is_file().then_some(fallback)
}

/// Default sources: the environment, then an optional configuration file.
pub fn default_sources(config_path: Option<PathBuf>) -> Vec<SourceSpec> {
    let mut sources = vec![SourceSpec::new("env")];
    if let Some(path) = config_path {
        let path_str = path.to_string_lossy().to_string();
        let format = extract_format_from_extension(&path_str);
        tracing::info!("Config file path: {}, format: {}", path_str, format);
        sources.push(
            SourceSpec::new("file")
                .with_format(format)
                .with_optional(true)
                .with_options(Document::new().with("path", path_str)),
        );
    }
    sources
}

/// Maps a file name to a format name: `yml` becomes `yaml`, no extension
/// means `json`.
pub fn extract_format_from_extension(path: &str) -> String {
    match path.rfind('.') {
        None => default_format(),
        Some(index) => {
            let ext = path[index + 1..].trim();
            if ext.is_empty() {
                default_format()
            } else if ext.eq_ignore_ascii_case("yml") {
                "yaml".to_string()
            } else {
                ext.to_lowercase()
            }
        }
    }
}
