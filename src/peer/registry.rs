use crate::peer::message::MessageEnvelope;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, warn};

type Handler = Arc<dyn Fn(Option<Value>) + Send + Sync>;

#[derive(Clone)]
struct Entry {
    id: u64,
    handler: Handler,
}

type HandlerMap = HashMap<String, Entry>;

struct Shared {
    // Replaced wholesale on every change; dispatch works on a snapshot.
    handlers: Mutex<Arc<HandlerMap>>,
    next_id: AtomicU64,
}

impl Shared {
    fn snapshot(&self) -> Arc<HandlerMap> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut HandlerMap)) {
        let mut guard = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HandlerMap::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }
}

/// Message type → at most one handler.
#[derive(Clone)]
pub struct HandlerRegistry {
    shared: Arc<Shared>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                handlers: Mutex::new(Arc::new(HandlerMap::new())),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register `handler` for `kind`, replacing any previous one.
    ///
    /// The handler receives `data` deserialised as `T`; use `()` for
    /// zero-payload types. A payload that does not fit `T` is logged and dropped.
    pub fn register<T, F>(&self, kind: impl Into<String>, handler: F) -> Registration
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let log_kind = kind.clone();
        let erased: Handler = Arc::new(move |data: Option<Value>| {
            match serde_json::from_value::<T>(data.unwrap_or(Value::Null)) {
                Ok(data) => handler(data),
                Err(err) => warn!(kind = %log_kind, error = %err, "dropping message with unexpected payload"),
            }
        });
        self.register_raw(kind, erased)
    }

    fn register_raw(&self, kind: String, handler: Handler) -> Registration {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.update(|map| {
            if map.insert(kind.clone(), Entry { id, handler }).is_some() {
                debug!(%kind, "replaced message handler");
            }
        });
        Registration {
            kind,
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Invoke the handler for `envelope.kind`. Returns whether one ran.
    pub fn dispatch(&self, envelope: MessageEnvelope) -> bool {
        let snapshot = self.shared.snapshot();
        match snapshot.get(&envelope.kind) {
            Some(entry) => {
                (entry.handler)(envelope.data);
                true
            }
            None => {
                debug!(kind = %envelope.kind, "no handler registered, dropping message");
                false
            }
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.shared.snapshot().contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.shared.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.shared.update(HandlerMap::clear);
    }
}

/// Capability to remove exactly the handler it was returned for.
///
/// Removing twice, or after the handler was replaced or cleared, does nothing.
#[derive(Debug, Clone)]
pub struct Registration {
    kind: String,
    id: u64,
    shared: Weak<Shared>,
}

impl Registration {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn deregister(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let is_ours = shared
            .snapshot()
            .get(&self.kind)
            .is_some_and(|entry| entry.id == self.id);
        if !is_ours {
            return;
        }
        shared.update(|map| {
            if map.get(&self.kind).is_some_and(|entry| entry.id == self.id) {
                map.remove(&self.kind);
            }
        });
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}
