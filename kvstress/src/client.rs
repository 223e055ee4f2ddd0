//! Client handles: one store connection plus the worker pool that drives it.

use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use crate::config::RunConfig;
use crate::document::DocumentFactory;
use crate::error::{Error, Result};
use crate::metrics::{Measures, RunResults, UnitReport};
use crate::pool::WorkerPool;
use crate::store::KvStore;
use crate::workload::{UnitConfig, WorkloadKind};

/// Upper bound for worker threads to exit once all workloads have finished.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Owns a store connection and releases it when dropped.
#[derive(Debug)]
struct Connection<S: KvStore>(Arc<S>);

impl<S: KvStore> Drop for Connection<S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs workload units against one store connection on its own worker pool.
#[derive(Debug)]
pub struct ClientHandle<S: KvStore> {
    id: String,
    config: Arc<RunConfig>,
    docs: u64,
    // declared before `connection`: dropping the pool waits for running units
    pool: Option<WorkerPool<UnitReport>>,
    connection: Option<Connection<S>>,
    results: RunResults,
    span: Span,
}

impl<S: KvStore> ClientHandle<S> {
    /// Creates a handle owning `store` that works on `docs` documents.
    ///
    /// The connection is released again if the configuration is invalid or the worker pool
    /// cannot be started.
    pub fn new(
        id: impl Into<String>,
        config: Arc<RunConfig>,
        docs: u64,
        store: S,
        parent: &Span,
    ) -> Result<Self> {
        let id = id.into();
        let connection = Connection(Arc::new(store));
        config.validate()?;
        let span = tracing::info_span!(parent: parent, "client", id = %id);

        let pool = WorkerPool::new(&id, config.num_threads).map_err(|source| Error::Pool {
            client: id.clone(),
            source,
        })?;

        Ok(Self {
            id,
            config,
            docs,
            pool: Some(pool),
            connection: Some(connection),
            results: RunResults::default(),
            span,
        })
    }

    /// Identifier of this client.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Starts `num_threads` workload units, each on an equal share of this client's documents.
    ///
    /// Documents that do not divide evenly across the units are skipped.
    pub fn execute_workload(
        &mut self,
        kind: WorkloadKind,
        documents: &Arc<DocumentFactory>,
    ) -> Result<()> {
        let _entered = self.span.enter();
        let (Some(pool), Some(connection)) = (self.pool.as_mut(), self.connection.as_ref()) else {
            return Err(Error::ClientClosed(self.id.clone()));
        };

        let threads = self.config.num_threads as u64;
        let docs_per_unit = self.docs / threads;
        let remainder = self.docs % threads;
        if remainder > 0 {
            tracing::warn!(
                docs = self.docs,
                threads,
                remainder,
                "documents do not divide evenly across workloads, skipping the remainder"
            );
        }

        for i in 1..=threads {
            let unit = kind.build(UnitConfig {
                store: Arc::clone(&connection.0),
                documents: Arc::clone(documents),
                name: format!("{}/workload-{i}", self.id),
                amount: docs_per_unit,
                ratio: self.config.ratio,
                sampling: self.config.sampling,
                ramp: self.config.ramp,
                parent: self.span.clone(),
            });

            tracing::trace!(unit = unit.name(), "submitting workload");
            pool.execute(move || unit.run());
        }

        Ok(())
    }

    /// Waits for all workload units, merges their results and releases the connection.
    ///
    /// Calling this more than once has no further effect.
    pub fn cleanup(&mut self) {
        let _entered = self.span.enter();
        let Some(pool) = self.pool.take() else {
            return;
        };

        tracing::debug!(active = pool.active(), "waiting for workloads to finish");
        for report in pool.join(SHUTDOWN_TIMEOUT) {
            tracing::debug!(
                unit = %report.name,
                total_ops = report.total_ops,
                measured_ops = report.measured_ops,
                "collected workload"
            );
            self.results.merge(report.into());
        }

        self.connection = None;
        tracing::debug!(total_ops = self.results.total_ops, "client finished");
    }

    /// Results merged from all finished workload units.
    pub fn results(&self) -> &RunResults {
        &self.results
    }

    /// Latency samples merged from all finished workload units.
    pub fn measures(&self) -> &Measures {
        &self.results.measures
    }

    /// Operations executed by all finished workload units.
    pub fn total_ops(&self) -> u64 {
        self.results.total_ops
    }

    /// Operations measured by all finished workload units.
    pub fn measured_ops(&self) -> u64 {
        self.results.measured_ops
    }

    /// Elapsed time of each finished workload unit.
    pub fn thread_elapsed(&self) -> &[Duration] {
        &self.results.thread_elapsed
    }
}
