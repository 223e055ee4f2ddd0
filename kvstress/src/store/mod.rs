//! The key-value store capability driven by the workloads.
//!
//! A [`Cluster`] hands out one [`KvStore`] connection per client handle. Each connection is
//! shared by all worker threads of that client, so implementations must be safe to call
//! concurrently. The load generator performs no locking of its own around store calls.

use std::error::Error as StdError;
use std::fmt;

use bytes::Bytes;
use thiserror::Error;

mod in_memory;
mod memcached;

pub use in_memory::InMemoryStore;
pub use memcached::{DEFAULT_PORT, MemcachedCluster, MemcachedStore};

/// Opaque version token returned by [`KvStore::gets`] and checked by [`KvStore::cas`].
pub type Cas = u64;

/// Errors returned by a single store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist.
    #[error("key not found")]
    NotFound,

    /// The key already exists, but the operation requires it to be absent.
    #[error("key already exists")]
    Exists,

    /// The store client reported an error.
    #[error("client error: {0}")]
    Client(#[source] Box<dyn StdError + Send + Sync>),
}

/// Outcome of a compare-and-swap.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CasOutcome {
    /// The value was replaced.
    Stored,
    /// The version token did not match the current version of the key.
    Conflict,
}

/// A connection to a key-value store.
pub trait KvStore: fmt::Debug + Send + Sync + 'static {
    /// Reads the value of `key`, returning `None` on a miss.
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Stores `value` under `key` unconditionally.
    fn set(&self, key: &str, value: &Bytes) -> Result<(), StoreError>;

    /// Stores `value` under `key` only if the key does not exist yet.
    fn add(&self, key: &str, value: &Bytes) -> Result<(), StoreError>;

    /// Reads the value of `key` together with its version token.
    fn gets(&self, key: &str) -> Result<(Bytes, Cas), StoreError>;

    /// Replaces the value of `key` if its version still matches `cas`.
    fn cas(&self, key: &str, cas: Cas, value: &Bytes) -> Result<CasOutcome, StoreError>;

    /// Releases the connection. Called exactly once by the owning client handle.
    fn close(&self) {}
}

/// The cluster-level resource from which client connections are opened.
pub trait Cluster: fmt::Debug + Send + Sync {
    /// The connection type handed out to client handles.
    type Store: KvStore;

    /// Opens a dedicated connection for the client handle `client_id`.
    fn open(&self, client_id: &str) -> Result<Self::Store, StoreError>;

    /// Releases cluster-wide resources. Called exactly once by the dispatcher.
    fn shutdown(&self) {}
}
