//! Weak-keyed association from carrier objects to contexts.
//!
//! Instrumentation stores the context current when a unit of work is handed
//! off (a task, a callback, a message) and re-attaches it where the work runs.
//! The carrier is held weakly: once it is dropped its entry is evicted.

use super::InstrumentationContext;
use dashmap::DashMap;
use std::sync::{Arc, Weak};

struct StoredContext<K: ?Sized> {
    carrier: Weak<K>,
    context: Arc<InstrumentationContext>,
}

/// Contexts keyed by the identity of a carrier object.
pub struct WeakContextStore<K: ?Sized> {
    entries: DashMap<usize, StoredContext<K>>,
}

impl<K: ?Sized> Default for WeakContextStore<K> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K: ?Sized> WeakContextStore<K> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(carrier: &Arc<K>) -> usize {
        Arc::as_ptr(carrier).cast::<()>() as usize
    }

    /// Associates `context` with `carrier`, replacing an earlier association.
    pub fn store(&self, carrier: &Arc<K>, context: Arc<InstrumentationContext>) {
        self.prune();
        self.entries.insert(
            Self::key(carrier),
            StoredContext {
                carrier: Arc::downgrade(carrier),
                context,
            },
        );
    }

    /// Returns the context stored for `carrier`.
    #[must_use]
    pub fn get(&self, carrier: &Arc<K>) -> Option<Arc<InstrumentationContext>> {
        let key = Self::key(carrier);
        let entry = self.entries.get(&key)?;
        if entry.carrier.upgrade().is_some_and(|live| Arc::ptr_eq(&live, carrier)) {
            return Some(Arc::clone(&entry.context));
        }
        drop(entry);
        // The address was reused by a new carrier after the old one died.
        self.entries.remove_if(&key, |_, e| e.carrier.strong_count() == 0);
        None
    }

    /// Removes and returns the context stored for `carrier`.
    ///
    /// The carrier check and the removal happen under one shard lock.
    pub fn take(&self, carrier: &Arc<K>) -> Option<Arc<InstrumentationContext>> {
        self.entries
            .remove_if(&Self::key(carrier), |_, e| {
                e.carrier
                    .upgrade()
                    .is_some_and(|live| Arc::ptr_eq(&live, carrier))
            })
            .map(|(_, entry)| entry.context)
    }

    /// Evicts entries whose carrier has been dropped.
    ///
    /// Returns the number of evicted entries.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.carrier.strong_count() > 0);
        before.saturating_sub(self.entries.len())
    }

    /// Returns the number of stored entries, including not yet pruned ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
