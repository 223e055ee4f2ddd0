//! A load generator for memcached-compatible key-value stores.
//!
//! A run is driven by a [`Dispatcher`]. It opens a number of clients against a [`Cluster`], each
//! with its own connection and a pool of worker threads. Every worker thread runs one
//! [`WorkloadUnit`](workload::WorkloadUnit), which executes the operation mix selected by
//! [`WorkloadKind`] on a share of the configured documents:
//!
//! - `getset`: stores a document, then reads it back `ratio` times.
//! - `getscas`: adds a document, then reads it with its CAS token and replaces it with a
//!   compare-and-swap, `ratio` times.
//!
//! The latencies of a configurable share of the iterations are recorded per operation kind and
//! merged once every worker has finished. [`Summary`] turns them into percentiles and throughput.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kvstress::{Dispatcher, RunConfig, Summary};
//! use kvstress::store::MemcachedCluster;
//!
//! # fn main() -> kvstress::Result<()> {
//! let config = Arc::new(RunConfig::default());
//! let cluster = MemcachedCluster::new(&config);
//!
//! let start = std::time::Instant::now();
//! let mut dispatcher = Dispatcher::init(config, cluster)?;
//! dispatcher.dispatch_workload()?;
//! Summary::new(&dispatcher.results(), start.elapsed()).print();
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod report;
pub mod store;
pub mod workload;

mod pool;

pub use crate::config::RunConfig;
pub use crate::dispatcher::Dispatcher;
pub use crate::error::{Error, Result};
pub use crate::report::Summary;
pub use crate::store::{Cluster, KvStore};
pub use crate::workload::WorkloadKind;
