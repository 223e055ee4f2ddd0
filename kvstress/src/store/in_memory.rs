//! In-process store for tests and dry runs.
//!
//! [`InMemoryStore`] keeps all entries in a `HashMap` and assigns a fresh version token on every
//! write. It is [`Clone`] and doubles as its own [`Cluster`], so every opened connection shares
//! the same entries. Tests hold on to a clone to inspect the store and the connection lifecycle
//! after a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::{Cas, CasOutcome, Cluster, KvStore, StoreError};

type Entries = HashMap<String, (Bytes, Cas)>;

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<Entries>,
    last_cas: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    shutdowns: AtomicUsize,
}

/// A thread-safe, versioned key-value store living in process memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Returns the stored value of `key`, bypassing the [`KvStore`] trait.
    pub fn value(&self, key: &str) -> Option<Bytes> {
        self.entries().get(key).map(|(value, _)| value.clone())
    }

    /// Returns all stored values in no particular order.
    pub fn values(&self) -> Vec<Bytes> {
        self.entries()
            .values()
            .map(|(value, _)| value.clone())
            .collect()
    }

    /// Number of connections opened through [`Cluster::open`].
    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::Relaxed)
    }

    /// Number of connections released through [`KvStore::close`].
    pub fn closed(&self) -> usize {
        self.inner.closed.load(Ordering::Relaxed)
    }

    /// Number of times [`Cluster::shutdown`] was called.
    pub fn shutdowns(&self) -> usize {
        self.inner.shutdowns.load(Ordering::Relaxed)
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_cas(&self) -> Cas {
        self.inner.last_cas.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &Bytes) -> Result<(), StoreError> {
        let cas = self.next_cas();
        self.entries().insert(key.to_owned(), (value.clone(), cas));
        Ok(())
    }

    fn add(&self, key: &str, value: &Bytes) -> Result<(), StoreError> {
        let mut entries = self.entries();
        if entries.contains_key(key) {
            return Err(StoreError::Exists);
        }
        entries.insert(key.to_owned(), (value.clone(), self.next_cas()));
        Ok(())
    }

    fn gets(&self, key: &str) -> Result<(Bytes, Cas), StoreError> {
        self.entries().get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn cas(&self, key: &str, cas: Cas, value: &Bytes) -> Result<CasOutcome, StoreError> {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return Err(StoreError::NotFound);
        };
        if entry.1 != cas {
            return Ok(CasOutcome::Conflict);
        }
        *entry = (value.clone(), self.next_cas());
        Ok(CasOutcome::Stored)
    }

    fn close(&self) {
        self.inner.closed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Cluster for InMemoryStore {
    type Store = InMemoryStore;

    fn open(&self, _client_id: &str) -> Result<Self::Store, StoreError> {
        self.inner.opened.fetch_add(1, Ordering::Relaxed);
        Ok(self.clone())
    }

    fn shutdown(&self) {
        self.inner.shutdowns.fetch_add(1, Ordering::Relaxed);
    }
}
