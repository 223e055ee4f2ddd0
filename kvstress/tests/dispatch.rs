use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use bytesize::ByteSize;
use kvstress::metrics::OpKind;
use kvstress::store::{Cas, CasOutcome, InMemoryStore, StoreError};
use kvstress::{Cluster, Dispatcher, Error, KvStore, RunConfig, Summary, WorkloadKind};
use kvstress_test::fixtures::DocumentFile;

fn run(config: RunConfig, cluster: &InMemoryStore) -> Dispatcher<InMemoryStore> {
    kvstress_test::tracing::init();

    let mut dispatcher =
        Dispatcher::init(Arc::new(config), cluster.clone()).expect("clients connect");
    dispatcher.dispatch_workload().expect("workload runs");
    dispatcher
}

#[test]
fn getscas_with_file_documents() {
    let file = DocumentFile::with_lines(&["  {\"type\": ", "   \"brewery\"}"]);
    let cluster = InMemoryStore::new();
    let config = RunConfig {
        num_clients: 2,
        num_threads: 4,
        num_docs: 80,
        ratio: 3,
        workload: WorkloadKind::GetsCas,
        filename: Some(file.path().to_owned()),
        ..Default::default()
    };

    let dispatcher = run(config, &cluster);
    let results = dispatcher.results();

    // one add plus three rounds of gets and cas per document
    assert_eq!(results.planned_docs, 80);
    assert_eq!(results.total_ops, 80 * 7);
    assert_eq!(results.measured_ops, 80 * 6);
    assert_eq!(results.measures.get(OpKind::Gets).len(), 240);
    assert_eq!(results.measures.get(OpKind::Cas).len(), 240);
    assert!(results.measures.get(OpKind::Set).is_empty());
    assert_eq!(results.thread_elapsed.len(), 8);

    let expected = Bytes::from_static(b"{\"type\":\"brewery\"}");
    let values = cluster.values();
    assert_eq!(values.len(), 80);
    assert!(values.iter().all(|value| *value == expected));

    assert_eq!(cluster.opened(), 2);
    assert_eq!(cluster.closed(), 2);
    assert_eq!(cluster.shutdowns(), 1);
}

#[test]
fn getset_with_sampling() {
    let cluster = InMemoryStore::new();
    let config = RunConfig {
        num_clients: 2,
        num_threads: 2,
        num_docs: 200,
        ratio: 4,
        sampling: 25,
        doc_size: ByteSize::b(128),
        ..Default::default()
    };

    let dispatcher = run(config, &cluster);
    let results = dispatcher.results();

    // every fourth of the 50 iterations per unit is measured
    assert_eq!(results.total_ops, 200 * 5);
    assert_eq!(results.measures.get(OpKind::Set).len(), 4 * 12);
    assert_eq!(results.measures.get(OpKind::Get).len(), 4 * 12 * 4);
    assert_eq!(results.measured_ops, 4 * 12 * 5);

    let values = cluster.values();
    assert_eq!(values.len(), 200);
    assert!(values.iter().all(|value| value.len() == 128));

    let summary = Summary::new(&results, Duration::from_secs(1));
    assert_eq!(summary.total_ops, 1000);
    assert_eq!(summary.kinds.len(), 2);
    assert!(summary.units.is_some());
}

#[test]
fn ramp_discards_all_measurements_of_short_runs() {
    let cluster = InMemoryStore::new();
    let config = RunConfig {
        num_docs: 50,
        ratio: 2,
        ramp: Duration::from_secs(3600),
        ..Default::default()
    };

    let dispatcher = run(config, &cluster);

    assert_eq!(dispatcher.total_ops(), 150);
    assert_eq!(dispatcher.measured_ops(), 0);
    assert!(dispatcher.measures().is_empty());
}

#[test]
fn missing_document_file() {
    kvstress_test::tracing::init();

    let cluster = InMemoryStore::new();
    let config = RunConfig {
        num_clients: 3,
        filename: Some("/does/not/exist.json".into()),
        ..Default::default()
    };

    let mut dispatcher = Dispatcher::init(Arc::new(config), cluster.clone()).unwrap();
    let err = dispatcher.dispatch_workload().unwrap_err();

    assert!(matches!(err, Error::Document(_)), "{err}");
    assert_eq!(cluster.shutdowns(), 1);
    assert!(cluster.is_empty());

    drop(dispatcher);
    assert_eq!(cluster.closed(), 3);
}

/// Delegates to an [`InMemoryStore`], but every `gets` fails and `client-2` cannot connect.
#[derive(Clone, Debug, Default)]
struct FlakyCluster {
    inner: InMemoryStore,
}

#[derive(Debug)]
struct FlakyStore(InMemoryStore);

impl KvStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &Bytes) -> Result<(), StoreError> {
        self.0.set(key, value)
    }

    fn add(&self, key: &str, value: &Bytes) -> Result<(), StoreError> {
        self.0.add(key, value)
    }

    fn gets(&self, _key: &str) -> Result<(Bytes, Cas), StoreError> {
        Err(StoreError::Client("connection reset".into()))
    }

    fn cas(&self, key: &str, cas: Cas, value: &Bytes) -> Result<CasOutcome, StoreError> {
        self.0.cas(key, cas, value)
    }

    fn close(&self) {
        self.0.close();
    }
}

impl Cluster for FlakyCluster {
    type Store = FlakyStore;

    fn open(&self, client_id: &str) -> Result<Self::Store, StoreError> {
        if client_id == "client-2" {
            return Err(StoreError::Client("connection refused".into()));
        }
        Ok(FlakyStore(self.inner.open(client_id)?))
    }

    fn shutdown(&self) {
        self.inner.shutdown();
    }
}

#[test]
fn failing_operations_end_only_their_iteration() {
    kvstress_test::tracing::init();

    let cluster = FlakyCluster::default();
    let config = RunConfig {
        num_threads: 2,
        num_docs: 10,
        ratio: 5,
        workload: WorkloadKind::GetsCas,
        ..Default::default()
    };

    let mut dispatcher = Dispatcher::init(Arc::new(config), cluster.clone()).unwrap();
    dispatcher.dispatch_workload().unwrap();

    // only the untimed add of each iteration succeeds
    assert_eq!(dispatcher.total_ops(), 10);
    assert_eq!(dispatcher.measured_ops(), 0);
    assert_eq!(dispatcher.thread_elapsed().len(), 2);
    assert_eq!(cluster.inner.len(), 10);
}

#[test]
fn connect_failure_releases_opened_clients() {
    kvstress_test::tracing::init();

    let cluster = FlakyCluster::default();
    let config = RunConfig {
        num_clients: 3,
        ..Default::default()
    };

    let err = Dispatcher::init(Arc::new(config), cluster.clone()).unwrap_err();

    assert!(matches!(&err, Error::Connect { client, .. } if client == "client-2"), "{err}");
    assert_eq!(cluster.inner.opened(), 1);
    assert_eq!(cluster.inner.closed(), 1);
    assert_eq!(cluster.inner.shutdowns(), 1);
}
