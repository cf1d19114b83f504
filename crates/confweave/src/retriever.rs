//! The retrieval engine: fetch every source, merge, diff, notify.
//!
//! A tick fetches all providers concurrently and joins on all of them before
//! merging in declaration order. Ticks never overlap. The snapshot is only
//! replaced when the merged document differs from it.

use std::cell::Cell;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::document::{merge_into, ConfigChange, Document};
use crate::error::{ConfigError, RetrievalError};
use crate::options::{load_engine_config, EngineConfig};
use crate::provider::SourceProvider;
use crate::store::Registry;
use crate::stream::ChangeStream;

/// Called synchronously, in registration order, for every change.
pub type ChangeListener = Arc<dyn Fn(&ConfigChange) + Send + Sync>;

type BeforeScanHandler = Arc<dyn Fn() + Send + Sync>;

thread_local! {
    /// Set while a tick notifies listeners, so a listener calling `close`
    /// does not wait on the publish lock its own tick holds.
    static PUBLISHING: Cell<bool> = const { Cell::new(false) };
}
type ConfigurationProcessor = Arc<dyn Fn(Document) -> Document + Send + Sync>;

/// Aggregates the configured sources into one live configuration.
///
/// Clones share the same engine.
#[derive(Clone)]
pub struct RetrievalEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    providers: Vec<SourceProvider>,
    poll_interval: Option<Duration>,
    snapshot: Arc<ArcSwap<Document>>,
    stream: ChangeStream,
    listeners: RwLock<Vec<ChangeListener>>,
    before_scan: RwLock<Option<BeforeScanHandler>>,
    processor: RwLock<Option<ConfigurationProcessor>>,
    /// Serializes ticks: the snapshot has a single writer.
    tick_lock: Mutex<()>,
    /// Held from the final `closed` check until notifications are queued,
    /// and by `close` while it sets the flag.
    publish_lock: std::sync::Mutex<()>,
    started: AtomicBool,
    closed: AtomicBool,
    shutdown: Arc<Notify>,
}

impl RetrievalEngine {
    /// Builds every source provider. Nothing is fetched until the first
    /// tick; call [`start`](Self::start) to enable periodic scanning.
    pub fn new(config: EngineConfig, registry: Arc<Registry>) -> Result<Self, ConfigError> {
        let providers = config
            .effective_sources()
            .iter()
            .map(|spec| SourceProvider::new(spec, &registry))
            .collect::<Result<Vec<_>, _>>()?;

        let poll_interval = (config.poll_interval_millis > 0)
            .then(|| Duration::from_millis(config.poll_interval_millis as u64));

        tracing::info!(
            "Retrieval engine created with {} source(s), poll interval: {}",
            providers.len(),
            match poll_interval {
                Some(interval) => format!("{}ms", interval.as_millis()),
                None => "disabled".to_string(),
            }
        );

        let snapshot = Arc::new(ArcSwap::from_pointee(Document::new()));
        let stream = ChangeStream::new(Arc::clone(&snapshot));

        Ok(Self {
            inner: Arc::new(EngineInner {
                providers,
                poll_interval,
                snapshot,
                stream,
                listeners: RwLock::new(Vec::new()),
                before_scan: RwLock::new(None),
                processor: RwLock::new(None),
                tick_lock: Mutex::new(()),
                publish_lock: std::sync::Mutex::new(()),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                shutdown: Arc::new(Notify::new()),
            }),
        })
    }

    /// Loads an engine config file (JSON or YAML) and builds the engine.
    pub fn from_config_file<P: AsRef<Path>>(
        path: P,
        registry: Arc<Registry>,
    ) -> Result<Self, ConfigError> {
        let config = load_engine_config(path)?;
        Self::new(config, registry)
    }

    /// Arms the periodic scan. Does nothing when polling is disabled, the
    /// engine is closed, or it was already started. Must be called within a
    /// Tokio runtime.
    ///
    /// The scan stops on [`close`](Self::close), or once every handle to the
    /// engine has been dropped.
    pub fn start(&self) -> Result<(), ConfigError> {
        let handle = Handle::try_current().map_err(|e| ConfigError::Validation {
            message: format!("the engine must be started within a Tokio runtime: {}", e),
        })?;
        self.inner.stream.ensure_delivery();

        let Some(period) = self.inner.poll_interval else {
            return Ok(());
        };
        if self.inner.closed.load(Ordering::Acquire)
            || self.inner.started.swap(true, Ordering::AcqRel)
        {
            return Ok(());
        }

        let engine = Arc::downgrade(&self.inner);
        let shutdown = Arc::clone(&self.inner.shutdown);
        handle.spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer.tick().await; // skip immediate first tick

            loop {
                tokio::select! {
                    _ = timer.tick() => {},
                    _ = shutdown.notified() => break,
                }

                let Some(inner) = engine.upgrade() else {
                    break;
                };
                if inner.closed.load(Ordering::Acquire) {
                    break;
                }

                inner.scan().await;
            }
            tracing::debug!("Periodic scan stopped");
        });

        Ok(())
    }

    /// Runs one tick and returns the merged document.
    ///
    /// Like a periodic scan, a successful call refreshes the cached snapshot
    /// and notifies listeners and the stream when the result changed. A
    /// failure leaves the snapshot untouched and is returned to the caller
    /// only.
    pub async fn fetch_once(&self) -> Result<Arc<Document>, RetrievalError> {
        self.inner.tick().await
    }

    /// The last successfully merged document; empty before the first tick.
    pub fn get_cached(&self) -> Arc<Document> {
        self.inner.snapshot.load_full()
    }

    /// The engine's change stream.
    pub fn subscribe(&self) -> ChangeStream {
        self.inner.stream.clone()
    }

    /// Registers a change listener.
    pub fn listen<F>(&self, listener: F) -> &Self
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        write_lock(&self.inner.listeners).push(Arc::new(listener));
        self
    }

    /// Called before every periodic scan.
    pub fn set_before_scan_handler<F>(&self, handler: F) -> &Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        *write_lock(&self.inner.before_scan) = Some(Arc::new(handler));
        self
    }

    /// Transforms the merged document before it is compared to the snapshot.
    pub fn set_configuration_processor<F>(&self, processor: F) -> &Self
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        *write_lock(&self.inner.processor) = Some(Arc::new(processor));
        self
    }

    /// The configured sources, in merge order.
    pub fn providers(&self) -> &[SourceProvider] {
        &self.inner.providers
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stops periodic scanning, releases every store and ends the stream.
    ///
    /// A tick still in flight runs to completion but its result is
    /// discarded. A tick that is already notifying listeners finishes first.
    /// Calling `close` again has no effect.
    pub fn close(&self) {
        {
            let _publish = (!PUBLISHING.with(Cell::get))
                .then(|| lock_publish(&self.inner.publish_lock));
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        self.inner.shutdown.notify_one();

        for provider in &self.inner.providers {
            provider.release();
        }
        self.inner.stream.end();
        tracing::info!("Retrieval engine closed");
    }
}

impl EngineInner {
    async fn scan(&self) {
        let handler = read_lock(&self.before_scan).clone();
        if let Some(handler) = handler {
            handler();
        }

        match self.tick().await {
            Ok(_) | Err(RetrievalError::Closed) => {}
            Err(e) => {
                tracing::error!("Error while scanning configuration: {}", e);
                self.stream.fail(Arc::new(e));
            }
        }
    }

    async fn tick(&self) -> Result<Arc<Document>, RetrievalError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RetrievalError::Closed);
        }
        let _guard = self.tick_lock.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(RetrievalError::Closed);
        }

        let span = tracing::info_span!("tick", sources = self.providers.len());
        let results = join_all(self.providers.iter().map(|p| p.fetch()))
            .instrument(span)
            .await;

        let mut merged = Document::new();
        for document in results {
            merge_into(&mut merged, &document?, true);
        }

        let processor = read_lock(&self.processor).clone();
        if let Some(processor) = processor {
            merged = processor(merged);
        }

        self.publish(merged)
    }

    /// Compares `merged` with the snapshot and publishes it if it changed.
    /// Runs entirely under the publish lock, so `close` either happens
    /// before (the result is discarded) or after every notification.
    fn publish(&self, merged: Document) -> Result<Arc<Document>, RetrievalError> {
        let _publish = lock_publish(&self.publish_lock);
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!("Engine closed during the tick, discarding its result");
            return Err(RetrievalError::Closed);
        }

        let previous = self.snapshot.load_full();
        if *previous == merged {
            return Ok(previous);
        }

        let current = Arc::new(merged);
        self.snapshot.store(Arc::clone(&current));
        tracing::info!("Configuration changed");

        let change = ConfigChange::new(previous, Arc::clone(&current));
        let listeners = read_lock(&self.listeners).clone();
        {
            let _scope = PublishScope::enter();
            for listener in listeners {
                listener(&change);
            }
        }
        self.stream.push(Arc::clone(&current));

        Ok(current)
    }
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("providers", &self.inner.providers)
            .field("poll_interval", &self.inner.poll_interval)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Marks the current thread as notifying listeners until dropped.
struct PublishScope;

impl PublishScope {
    fn enter() -> Self {
        PUBLISHING.with(|flag| flag.set(true));
        Self
    }
}

impl Drop for PublishScope {
    fn drop(&mut self) {
        PUBLISHING.with(|flag| flag.set(false));
    }
}

fn lock_publish(lock: &std::sync::Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Tests
// ============================================================================
