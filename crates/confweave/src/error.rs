use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfweaveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// Construction-time errors. An engine or store that fails with one of these
/// is never usable.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse engine config: {0}")]
    Parse(String),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("The `{option}` option is required by the '{store}' store")]
    MissingOption { store: String, option: String },

    #[error("Invalid `{option}` option for the '{store}' store: {reason}")]
    InvalidOption {
        store: String,
        option: String,
        reason: String,
    },

    #[error("Unknown configuration store '{name}' (known stores: {known})")]
    UnknownStore { name: String, known: String },

    #[error("Unknown configuration format '{name}' (supported formats: {known})")]
    UnknownFormat { name: String, known: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Failures to obtain the bytes of a source.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory scan failed for '{path}': {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to decode '{path}': {source}")]
    DecodeFile {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request to {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to encode configuration: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Malformed payload for the declared format.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid properties at line {line}: {message}")]
    Properties { line: usize, message: String },

    #[error("Expected a {format} object at the top level")]
    NotAnObject { format: String },

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Raw decoder: {0}")]
    Raw(String),
}

/// A store or decoder failure annotated with the source it came from.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unable to retrieve configuration from '{source_name}': {error}")]
    Fetch {
        source_name: String,
        #[source]
        error: StoreError,
    },

    #[error("Unable to process configuration from '{source_name}': {error}")]
    Decode {
        source_name: String,
        #[source]
        error: DecodeError,
    },
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("The retrieval engine is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ConfweaveError>;
