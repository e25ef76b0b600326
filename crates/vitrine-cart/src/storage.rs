//! Durable key-value storage seam for the cart record.
//!
//! The model is browser local storage: string keys, string values, and
//! change events that fire in every OTHER attached context, never the
//! writer's own. Each UI surface holds its own handle; handles to the
//! same backend see each other's writes through [`CartStorage::watch_external`].

use crate::bus::Subscription;
use crate::error::CartError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};

/// A write observed on the shared store. Carries the key only; readers
/// fetch the fresh value themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
}

/// Key-value storage as one attached context sees it.
pub trait CartStorage: Send + Sync {
    /// Read the raw record under a key.
    fn get(&self, key: &str) -> Result<Option<String>, CartError>;

    /// Write the raw record under a key, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> Result<(), CartError>;

    /// Delete the record under a key.
    fn remove(&self, key: &str) -> Result<(), CartError>;

    /// Subscribe to writes performed through other handles of the same
    /// backing store. The writer's own context never hears its own
    /// writes here.
    fn watch_external(&self) -> Subscription<StorageEvent>;
}

struct Watcher {
    context: u64,
    tx: mpsc::Sender<StorageEvent>,
}

/// Shared in-memory backend. One per "browser"; each surface attaches
/// its own [`StorageHandle`].
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<HashMap<String, String>>,
    watchers: Mutex<Vec<Watcher>>,
    next_context: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a new context to this backend.
    pub fn attach(self: &Arc<Self>) -> StorageHandle {
        let context = self.next_context.fetch_add(1, Ordering::SeqCst);
        StorageHandle {
            backend: Arc::clone(self),
            context,
        }
    }

    fn notify_others(&self, writer: u64, key: &str) -> Result<(), CartError> {
        let mut watchers = self.watchers.lock().map_err(|_| CartError::Poisoned)?;
        // Dead watchers are dropped while publishing; the writer's own
        // context is skipped, matching storage-event semantics.
        watchers.retain(|w| {
            if w.context == writer {
                return true;
            }
            w.tx.send(StorageEvent {
                key: key.to_string(),
            })
            .is_ok()
        });
        Ok(())
    }
}

/// One context's view of a [`MemoryStorage`].
pub struct StorageHandle {
    backend: Arc<MemoryStorage>,
    context: u64,
}

impl CartStorage for StorageHandle {
    fn get(&self, key: &str) -> Result<Option<String>, CartError> {
        let records = self
            .backend
            .records
            .lock()
            .map_err(|_| CartError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CartError> {
        {
            let mut records = self
                .backend
                .records
                .lock()
                .map_err(|_| CartError::Poisoned)?;
            records.insert(key.to_string(), value.to_string());
        }
        self.backend.notify_others(self.context, key)
    }

    fn remove(&self, key: &str) -> Result<(), CartError> {
        let removed = {
            let mut records = self
                .backend
                .records
                .lock()
                .map_err(|_| CartError::Poisoned)?;
            records.remove(key).is_some()
        };
        if removed {
            self.backend.notify_others(self.context, key)?;
        }
        Ok(())
    }

    fn watch_external(&self) -> Subscription<StorageEvent> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut watchers) = self.backend.watchers.lock() {
            watchers.push(Watcher {
                context: self.context,
                tx,
            });
        }
        Subscription::new(rx)
    }
}
