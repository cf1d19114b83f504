pub mod coerce;
pub mod decoder;
pub mod document;
pub mod error;
pub mod fileset;
pub mod glob;
pub mod logging;
pub mod options;
pub mod provider;
pub mod retriever;
pub mod store;
pub mod stream;

pub use decoder::{Decoder, DecoderRegistry};
pub use document::{merge_all, merge_into, ConfigChange, Document};
pub use error::{
    ConfigError, ConfweaveError, DecodeError, Result, RetrievalError, SourceError, StoreError,
};
pub use fileset::FileSet;
pub use logging::{init_logging, LogFormat};
pub use options::{
    extract_format_from_extension, load_engine_config, load_engine_config_from_str,
    ConfigFileFormat, EngineConfig, FileSetSpec, SourceSpec,
};
pub use provider::SourceProvider;
pub use retriever::{ChangeListener, RetrievalEngine};
pub use store::{Registry, RegistryBuilder, Store, StoreFactory};
pub use stream::ChangeStream;
