//! Store connections speaking the memcached protocol.
//!
//! Couchbase buckets and plain memcached servers both accept this protocol. Each client handle
//! opens its own [`memcache::Client`], which keeps a pool of one TCP connection per worker thread
//! so that concurrent calls never wait on each other.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use memcache::{Client, MemcacheError};
use secrecy::ExposeSecret;

use super::{Cas, CasOutcome, Cluster, KvStore, StoreError};
use crate::config::RunConfig;

/// Port used for nodes given without an explicit port.
pub const DEFAULT_PORT: u16 = 11211;

/// Items never expire on their own.
const NO_EXPIRATION: u32 = 0;

impl From<MemcacheError> for StoreError {
    fn from(err: MemcacheError) -> Self {
        StoreError::Client(Box::new(err))
    }
}

/// The set of memcached nodes the load is generated against.
pub struct MemcachedCluster {
    urls: Vec<String>,
    pool_size: u32,
}

impl MemcachedCluster {
    /// Creates a cluster from the nodes and credentials in `config`.
    ///
    /// No connection is made until a client handle calls [`Cluster::open`].
    pub fn new(config: &RunConfig) -> Self {
        let urls = config
            .nodes
            .iter()
            .map(|node| node_url(node, &config.bucket, config.password.expose_secret()))
            .collect();

        Self {
            urls,
            pool_size: u32::try_from(config.num_threads).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Debug for MemcachedCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the urls may carry credentials
        f.debug_struct("MemcachedCluster")
            .field("nodes", &self.urls.len())
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

impl Cluster for MemcachedCluster {
    type Store = MemcachedStore;

    fn open(&self, client_id: &str) -> Result<Self::Store, StoreError> {
        tracing::debug!(client = client_id, pool_size = self.pool_size, "connecting");
        let client = Client::with_pool_size(self.urls.clone(), self.pool_size)?;

        Ok(MemcachedStore {
            client_id: client_id.to_owned(),
            client,
        })
    }

    fn shutdown(&self) {
        tracing::debug!("releasing cluster");
    }
}

/// A pooled memcached connection owned by one client handle.
pub struct MemcachedStore {
    client_id: String,
    client: Client,
}

impl fmt::Debug for MemcachedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedStore")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl KvStore for MemcachedStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let value: Option<Vec<u8>> = self.client.get(key)?;
        Ok(value.map(Bytes::from))
    }

    fn set(&self, key: &str, value: &Bytes) -> Result<(), StoreError> {
        self.client.set(key, &value[..], NO_EXPIRATION)?;
        Ok(())
    }

    fn add(&self, key: &str, value: &Bytes) -> Result<(), StoreError> {
        self.client.add(key, &value[..], NO_EXPIRATION)?;
        Ok(())
    }

    fn gets(&self, key: &str) -> Result<(Bytes, Cas), StoreError> {
        let mut found: HashMap<String, (Vec<u8>, u32, Option<u64>)> = self.client.gets(&[key])?;
        match found.remove(key) {
            Some((value, _flags, Some(cas))) => Ok((Bytes::from(value), cas)),
            Some((_, _, None)) => Err(StoreError::Client(
                format!("server returned no cas token for `{key}`").into(),
            )),
            None => Err(StoreError::NotFound),
        }
    }

    fn cas(&self, key: &str, cas: Cas, value: &Bytes) -> Result<CasOutcome, StoreError> {
        let stored = self.client.cas(key, &value[..], NO_EXPIRATION, cas)?;
        Ok(if stored {
            CasOutcome::Stored
        } else {
            CasOutcome::Conflict
        })
    }

    fn close(&self) {
        tracing::debug!(client = %self.client_id, "closing connection");
    }
}

/// Builds the connection URL for a single node.
///
/// Nodes without a port use [`DEFAULT_PORT`]. A non-empty password authenticates against the
/// bucket using the binary protocol.
fn node_url(node: &str, bucket: &str, password: &str) -> String {
    let node = node.trim();
    let authority = if node.contains(':') {
        node.to_owned()
    } else {
        format!("{node}:{DEFAULT_PORT}")
    };

    if password.is_empty() {
        format!("memcache://{authority}")
    } else {
        format!("memcache://{bucket}:{password}@{authority}?protocol=binary")
    }
}
