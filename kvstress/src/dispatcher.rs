//! Spreads a workload across client handles and merges their results.

use std::sync::Arc;
use std::time::Duration;

use tracing::Span;

use crate::client::ClientHandle;
use crate::config::RunConfig;
use crate::document::DocumentFactory;
use crate::error::{Error, Result};
use crate::metrics::{Measures, RunResults};
use crate::store::Cluster;

/// Holds the cluster and shuts it down exactly once, when dropped.
#[derive(Debug)]
struct ClusterSession<C: Cluster>(C);

impl<C: Cluster> Drop for ClusterSession<C> {
    fn drop(&mut self) {
        tracing::debug!("shutting down cluster");
        self.0.shutdown();
    }
}

/// Owns all client handles of a run.
#[derive(Debug)]
pub struct Dispatcher<C: Cluster> {
    config: Arc<RunConfig>,
    session: Option<ClusterSession<C>>,
    handles: Vec<ClientHandle<C::Store>>,
    span: Span,
}

impl<C: Cluster> Dispatcher<C> {
    /// Opens one client handle per configured client.
    ///
    /// Each client works on an equal share of the documents; the remainder of the division is
    /// skipped. If the configuration is invalid or any client fails to connect, the clients
    /// opened so far and the cluster are released before the error is returned.
    pub fn init(config: Arc<RunConfig>, cluster: C) -> Result<Self> {
        let session = ClusterSession(cluster);
        config.validate()?;
        let span = tracing::info_span!("dispatch", workload = %config.workload);

        let docs_per_client = config.docs_per_client();
        let remainder = config.num_docs % config.num_clients as u64;
        if remainder > 0 {
            tracing::warn!(
                parent: &span,
                num_docs = config.num_docs,
                num_clients = config.num_clients,
                remainder,
                "documents do not divide evenly across clients, skipping the remainder"
            );
        }

        let mut handles = Vec::with_capacity(config.num_clients);
        for i in 1..=config.num_clients {
            let id = format!("client-{i}");
            let store = session.0.open(&id).map_err(|source| Error::Connect {
                client: id.clone(),
                source,
            })?;
            tracing::debug!(parent: &span, client = %id, docs = docs_per_client, "client connected");
            handles.push(ClientHandle::new(
                id,
                Arc::clone(&config),
                docs_per_client,
                store,
                &span,
            )?);
        }

        Ok(Self {
            config,
            session: Some(session),
            handles,
            span,
        })
    }

    /// Runs the configured workload on every client and waits for all of them to finish.
    ///
    /// The cluster is shut down when this returns, whether the run succeeded or not, so a
    /// dispatcher can only run once.
    pub fn dispatch_workload(&mut self) -> Result<()> {
        let _session = self.session.take().ok_or(Error::AlreadyDispatched)?;
        let _entered = self.span.enter();

        let documents = Arc::new(DocumentFactory::from_config(&self.config)?);
        let kind = self.config.workload;

        tracing::info!(clients = self.handles.len(), "running workload");
        for handle in &mut self.handles {
            handle.execute_workload(kind, &documents)?;
        }
        for handle in &mut self.handles {
            handle.cleanup();
        }
        tracing::debug!("finished workload");

        Ok(())
    }

    /// Results of all clients merged into one.
    pub fn results(&self) -> RunResults {
        self.handles
            .iter()
            .map(|handle| handle.results().clone())
            .collect()
    }

    /// Latency samples of all clients, concatenated per operation kind.
    pub fn measures(&self) -> Measures {
        let mut measures = Measures::default();
        for handle in &self.handles {
            measures.merge(handle.measures().clone());
        }
        measures
    }

    /// Operations executed by all clients.
    pub fn total_ops(&self) -> u64 {
        self.handles.iter().map(ClientHandle::total_ops).sum()
    }

    /// Operations measured by all clients.
    pub fn measured_ops(&self) -> u64 {
        self.handles.iter().map(ClientHandle::measured_ops).sum()
    }

    /// Elapsed time of every workload unit of every client.
    pub fn thread_elapsed(&self) -> Vec<Duration> {
        self.handles
            .iter()
            .flat_map(|handle| handle.thread_elapsed().iter().copied())
            .collect()
    }
}
