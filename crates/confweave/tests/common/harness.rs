//! Temp-directory harness for engine integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use confweave::{Document, EngineConfig, Registry, RetrievalEngine};

/// Isolated directory tree for configuration files.
pub struct TestHarness {
    temp_dir: TempDir,
    /// Root passed to directory stores.
    pub config_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            config_dir,
        }
    }

    /// Writes a file below the config directory, creating parents.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.config_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write config file");
        path
    }

    /// Writes an engine config file next to the config directory.
    pub fn write_engine_config(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(filename);
        std::fs::write(&path, content).expect("Failed to write engine config");
        path
    }

    /// Builds an engine over the built-in registry.
    pub fn engine(&self, config: EngineConfig) -> RetrievalEngine {
        RetrievalEngine::new(config, Arc::new(Registry::builtin()))
            .expect("Failed to build engine")
    }
}

/// Forwards every document delivered by the engine's stream into a channel.
pub fn collect_stream(engine: &RetrievalEngine) -> mpsc::UnboundedReceiver<Arc<Document>> {
    let (tx, rx) = mpsc::unbounded_channel();
    engine.subscribe().set_handler(move |document| {
        let _ = tx.send(document);
    });
    rx
}

/// Waits up to one second for the next item.
pub async fn next_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<T> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
}
