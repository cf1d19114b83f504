//! Single-subscriber, pausable stream of configuration snapshots.
//!
//! Every handler call happens on one delivery task, in the order the
//! corresponding events were produced, and never inline in the call that
//! registered the handler.

use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::document::Document;
use crate::error::RetrievalError;

type DataHandler = Box<dyn FnMut(Arc<Document>) + Send>;
type ErrorHandler = Box<dyn FnMut(Arc<RetrievalError>) + Send>;
type EndHandler = Box<dyn FnOnce() + Send>;

enum Command {
    SetHandler(DataHandler),
    SetErrorHandler(ErrorHandler),
    SetEndHandler(EndHandler),
    Data(Arc<Document>),
    Error(Arc<RetrievalError>),
    End,
}

#[derive(Default)]
struct StreamState {
    paused: bool,
    /// Latest value pushed while paused.
    pending: Option<Arc<Document>>,
    /// Last value handed to the delivery task or buffered.
    last_queued: Option<Arc<Document>>,
    ended: bool,
}

struct Shared {
    tx: mpsc::UnboundedSender<Command>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    state: Arc<Mutex<StreamState>>,
    snapshot: Arc<ArcSwap<Document>>,
}

/// Handle to an engine's change stream. Clones share the same stream.
#[derive(Clone)]
pub struct ChangeStream {
    shared: Arc<Shared>,
}

impl ChangeStream {
    /// Creates a stream whose late subscribers receive `snapshot` first.
    pub(crate) fn new(snapshot: Arc<ArcSwap<Document>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                tx,
                rx: Mutex::new(Some(rx)),
                state: Arc::new(Mutex::new(StreamState::default())),
                snapshot,
            }),
        }
    }

    /// Registers the consumer, replacing any previous one. A non-empty
    /// cached snapshot is delivered to it first, exactly once even when a
    /// tick publishes that same snapshot concurrently.
    pub fn set_handler<F>(&self, handler: F) -> &Self
    where
        F: FnMut(Arc<Document>) + Send + 'static,
    {
        let mut state = self.state();
        self.send(Command::SetHandler(Box::new(handler)));
        let cached = self.shared.snapshot.load_full();
        if !cached.is_empty() && !state.ended {
            self.enqueue(&mut state, cached);
        }
        self
    }

    /// Called with tick failures that happen during periodic scanning.
    pub fn set_error_handler<F>(&self, handler: F) -> &Self
    where
        F: FnMut(Arc<RetrievalError>) + Send + 'static,
    {
        self.send(Command::SetErrorHandler(Box::new(handler)));
        self
    }

    /// Called once when the owning engine is closed.
    pub fn set_end_handler<F>(&self, handler: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::SetEndHandler(Box::new(handler)));
        self
    }

    /// Buffers subsequent values; only the latest one is kept.
    pub fn pause(&self) -> &Self {
        self.state().paused = true;
        self
    }

    /// Delivers the buffered value, if any.
    pub fn resume(&self) -> &Self {
        let mut state = self.state();
        state.paused = false;
        if let Some(pending) = state.pending.take() {
            self.send(Command::Data(pending));
        }
        self
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    pub(crate) fn push(&self, document: Arc<Document>) {
        let mut state = self.state();
        if state.ended {
            return;
        }
        // Already queued by `set_handler` as the cached snapshot.
        if let Some(last) = &state.last_queued {
            if Arc::ptr_eq(last, &document) {
                return;
            }
        }
        self.enqueue(&mut state, document);
    }

    fn enqueue(&self, state: &mut StreamState, document: Arc<Document>) {
        state.last_queued = Some(Arc::clone(&document));
        if state.paused {
            state.pending = Some(document);
        } else {
            self.send(Command::Data(document));
        }
    }

    pub(crate) fn fail(&self, error: Arc<RetrievalError>) {
        if self.state().ended {
            return;
        }
        self.send(Command::Error(error));
    }

    pub(crate) fn end(&self) {
        let mut state = self.state();
        if state.ended {
            return;
        }
        state.ended = true;
        state.pending = None;
        state.last_queued = None;
        self.send(Command::End);
    }

    /// Starts the delivery task once a Tokio runtime is available. Commands
    /// sent before that are queued.
    pub(crate) fn ensure_delivery(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let rx = match self.shared.rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(rx) = rx {
            handle.spawn(deliver(rx, Arc::clone(&self.shared.state)));
        }
    }

    fn send(&self, command: Command) {
        // The receiver only goes away after `End`.
        let _ = self.shared.tx.send(command);
        self.ensure_delivery();
    }

    fn state(&self) -> MutexGuard<'_, StreamState> {
        lock_state(&self.shared.state)
    }
}

impl std::fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ChangeStream")
            .field("paused", &state.paused)
            .field("pending", &state.pending.is_some())
            .field("ended", &state.ended)
            .finish()
    }
}

fn lock_state(state: &Mutex<StreamState>) -> MutexGuard<'_, StreamState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn deliver(mut rx: mpsc::UnboundedReceiver<Command>, state: Arc<Mutex<StreamState>>) {
    let mut data_handler: Option<DataHandler> = None;
    let mut error_handler: Option<ErrorHandler> = None;
    let mut end_handler: Option<EndHandler> = None;

    while let Some(command) = rx.recv().await {
        match command {
            Command::SetHandler(handler) => data_handler = Some(handler),
            Command::SetErrorHandler(handler) => error_handler = Some(handler),
            Command::SetEndHandler(handler) => end_handler = Some(handler),
            Command::Data(document) => {
                {
                    // Paused after this value was queued: keep it unless a
                    // newer one is already buffered.
                    let mut state = lock_state(&state);
                    if state.paused {
                        if state.pending.is_none() {
                            state.pending = Some(document);
                        }
                        continue;
                    }
                }
                if let Some(handler) = data_handler.as_mut() {
                    handler(document);
                }
            }
            Command::Error(error) => match error_handler.as_mut() {
                Some(handler) => handler(error),
                None => tracing::debug!("No error handler registered, dropping: {}", error),
            },
            Command::End => {
                if let Some(handler) = end_handler.take() {
                    handler();
                }
                break;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
