use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::store::StoreError;

/// Errors that abort a load test before or while it is being set up.
///
/// Failures of individual store operations never surface here; workloads log and skip them.
#[derive(Debug, Error)]
pub enum Error {
    /// The run configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The document payload could not be prepared.
    #[error("failed to prepare documents")]
    Document(#[from] DocumentError),

    /// A client could not establish its connection to the store.
    #[error("failed to connect {client} to the store")]
    Connect {
        /// Identifier of the client handle.
        client: String,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// The worker pool of a client could not be started.
    #[error("failed to start worker pool for {client}")]
    Pool {
        /// Identifier of the client handle.
        client: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The client was already cleaned up and cannot run another workload.
    #[error("{0} has already been cleaned up")]
    ClientClosed(String),

    /// The dispatcher has already run its workload.
    #[error("workload has already been dispatched")]
    AlreadyDispatched,
}

/// Result type for load test setup.
pub type Result<T, E = Error> = std::result::Result<T, E>;
