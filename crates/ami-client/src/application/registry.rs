//! CallbackRegistry: keyed store of message handlers.
//!
//! The engine keeps two registries that never share a lock:
//!
//! - **action handlers**, keyed by `ActionID`.  An entry registered with
//!   `retain = false` is removed the moment it is claimed for dispatch, so it
//!   fires at most once.  `retain = true` keeps it alive for multi-packet
//!   responses (a list action followed by its `...Complete` event) until the
//!   owner removes it.
//! - **event handlers**, keyed by event name.  Claiming never removes them.
//!
//! # Locking
//!
//! A `std::sync::RwLock` guards the map: lookups share the lock, `set` and
//! `remove` take it exclusively.  The lock is synchronous so handlers, which
//! are plain closures, can deregister themselves.  Poisoning is ignored; the
//! map is never left half-updated by a panicking holder.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ami_core::Message;

/// A message handler shared between a registry and its owner.
pub type Handler = Arc<dyn Fn(Message) + Send + Sync + 'static>;

/// One registry entry: the handler and its retention flag.
#[derive(Clone)]
pub struct CallbackEntry {
    /// Procedure invoked with each matching message.
    pub handler: Handler,
    /// `false`: removed after the first dispatch.  `true`: kept until removed.
    pub retain: bool,
    /// Distinguishes this registration from a later one under the same key.
    generation: u64,
}

impl fmt::Debug for CallbackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("retain", &self.retain)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Thread-safe map from a key to a [`CallbackEntry`].
#[derive(Default)]
pub struct CallbackRegistry {
    entries: RwLock<HashMap<String, CallbackEntry>>,
    next_generation: AtomicU64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` under `key`, replacing any existing entry.
    pub fn set(&self, key: impl Into<String>, handler: Handler, retain: bool) {
        let entry = CallbackEntry {
            handler,
            retain,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };
        self.write().insert(key.into(), entry);
    }

    /// Returns a copy of the entry registered under `key`.
    pub fn get(&self, key: &str) -> Option<CallbackEntry> {
        self.read().get(key).cloned()
    }

    /// Removes the entry under `key`.  Returns `false` if there was none;
    /// removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Returns the handler to run for a message carrying `key`.
    ///
    /// A non-retaining entry is removed before this returns.  If two callers
    /// claim the same non-retaining entry concurrently, only one of them gets
    /// the handler.
    pub fn claim(&self, key: &str) -> Option<Handler> {
        let entry = self.get(key)?;
        if entry.retain {
            return Some(entry.handler);
        }

        let mut entries = self.write();
        let still_current = entries
            .get(key)
            .is_some_and(|current| current.generation == entry.generation);
        if still_current {
            entries.remove(key).map(|e| e.handler)
        } else {
            // Removed or replaced between the lookup and the write lock.
            None
        }
    }

    /// Returns `true` if `key` has an entry.
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CallbackEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CallbackEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.read().keys().cloned().collect();
        keys.sort_unstable();
        f.debug_struct("CallbackRegistry").field("keys", &keys).finish()
    }
}
