//! Workload units: the operation mixes executed against the store.
//!
//! A [`WorkloadUnit`] runs a fixed number of iterations sequentially on a single worker thread.
//! Every iteration works on a fresh random key. Only every `100 / sampling`-th iteration is
//! timed, and timings taken before the unit has been running for the configured ramp-up time
//! are discarded.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::Span;
use uuid::Uuid;

use crate::document::DocumentFactory;
use crate::metrics::{Measures, OpKind, UnitReport};
use crate::store::{CasOutcome, KvStore, StoreError};

/// The built-in operation mixes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    /// One `set` followed by `ratio` `get`s of the same key.
    #[default]
    GetSet,
    /// One `add` followed by `ratio` rounds of `gets` and `cas` on the same key.
    GetsCas,
}

impl WorkloadKind {
    /// Returns the name used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::GetSet => "getset",
            WorkloadKind::GetsCas => "getscas",
        }
    }

    /// Creates a unit running this operation mix.
    pub fn build<S: KvStore>(self, config: UnitConfig<S>) -> WorkloadUnit<S> {
        let span = tracing::info_span!(
            parent: &config.parent,
            "workload",
            name = %config.name,
            kind = self.as_str(),
        );

        WorkloadUnit {
            kind: self,
            store: config.store,
            documents: config.documents,
            name: config.name,
            amount: config.amount,
            ratio: config.ratio,
            sampler: Sampler::new(config.sampling),
            recorder: Recorder::new(config.ramp),
            span,
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "getset" => Ok(WorkloadKind::GetSet),
            "getscas" => Ok(WorkloadKind::GetsCas),
            _ => Err(format!(
                "unknown workload `{s}`, expected `getset` or `getscas`"
            )),
        }
    }
}

/// Everything a [`WorkloadUnit`] is constructed from.
#[derive(Debug)]
pub struct UnitConfig<S> {
    /// Connection shared with the other units of the same client.
    pub store: Arc<S>,
    /// Source of the stored values.
    pub documents: Arc<DocumentFactory>,
    /// Name of the unit for identification in logs.
    pub name: String,
    /// Number of iterations to run.
    pub amount: u64,
    /// Reads (or gets/cas rounds) per iteration.
    pub ratio: u32,
    /// Percentage of iterations to time, between 1 and 100.
    pub sampling: u32,
    /// Time after start during which timings are discarded.
    pub ramp: Duration,
    /// Span of the owning client, under which the unit logs.
    pub parent: Span,
}

/// Decides which iterations are timed.
///
/// A counter is incremented per iteration. The iteration at which it reaches
/// `100 / sampling` is sampled and the counter starts over, so samples are evenly spaced.
#[derive(Debug)]
struct Sampler {
    every: u32,
    count: u32,
}

impl Sampler {
    fn new(sampling: u32) -> Self {
        Self {
            every: (100 / sampling.clamp(1, 100)).max(1),
            count: 0,
        }
    }

    fn next(&mut self) -> bool {
        self.count += 1;
        if self.count == self.every {
            self.count = 0;
            return true;
        }
        false
    }
}

/// Owns the counters and latency buckets of a unit, and applies the ramp-up gate.
#[derive(Debug)]
struct Recorder {
    ramp: Duration,
    started: Option<Instant>,
    elapsed: Duration,
    total_ops: u64,
    measured_ops: u64,
    measures: Measures,
}

impl Recorder {
    fn new(ramp: Duration) -> Self {
        Self {
            ramp,
            started: None,
            elapsed: Duration::ZERO,
            total_ops: 0,
            measured_ops: 0,
            measures: Measures::default(),
        }
    }

    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) {
        self.elapsed = self.elapsed();
        self.started = None;
    }

    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => started.elapsed(),
            None => self.elapsed,
        }
    }

    fn incr_total_ops(&mut self) {
        self.total_ops += 1;
    }

    /// Retains `latency` unless the unit is still ramping up.
    fn add_measure(&mut self, kind: OpKind, latency: Duration) {
        if self.elapsed() < self.ramp {
            return;
        }
        self.measures.record(kind, latency);
        self.measured_ops += 1;
    }
}

/// A single schedulable run of an operation mix against one store connection.
#[derive(Debug)]
pub struct WorkloadUnit<S> {
    kind: WorkloadKind,
    store: Arc<S>,
    documents: Arc<DocumentFactory>,
    name: String,
    amount: u64,
    ratio: u32,
    sampler: Sampler,
    recorder: Recorder,
    span: Span,
}

impl<S: KvStore> WorkloadUnit<S> {
    /// Name of the unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs all iterations to completion and returns the unit's results.
    ///
    /// A failing operation ends only its own iteration. It is logged with its key, and the unit
    /// continues with the next iteration.
    pub fn run(mut self) -> UnitReport {
        let span = self.span.clone();
        let _entered = span.enter();
        tracing::debug!(amount = self.amount, ratio = self.ratio, "starting workload");

        self.recorder.start();
        for _ in 0..self.amount {
            let key = Uuid::new_v4().to_string();
            let sampled = self.sampler.next();

            let result = match self.kind {
                WorkloadKind::GetSet => self.get_set(&key, sampled),
                WorkloadKind::GetsCas => self.gets_cas(&key, sampled),
            };

            if let Err(err) = result {
                tracing::warn!(
                    %key,
                    error = &err as &dyn std::error::Error,
                    "problem while running {} on key",
                    self.kind,
                );
            }
        }
        self.recorder.stop();

        tracing::debug!(
            total_ops = self.recorder.total_ops,
            measured_ops = self.recorder.measured_ops,
            elapsed = ?self.recorder.elapsed,
            "finished workload"
        );

        UnitReport {
            name: self.name,
            amount: self.amount,
            total_ops: self.recorder.total_ops,
            measured_ops: self.recorder.measured_ops,
            measures: self.recorder.measures,
            elapsed: self.recorder.elapsed,
        }
    }

    fn get_set(&mut self, key: &str, sampled: bool) -> Result<(), StoreError> {
        let document = self.documents.get_document();
        self.execute(sampled.then_some(OpKind::Set), |store| {
            store.set(key, &document)
        })?;

        for _ in 0..self.ratio {
            self.execute(sampled.then_some(OpKind::Get), |store| store.get(key))?;
        }
        Ok(())
    }

    fn gets_cas(&mut self, key: &str, sampled: bool) -> Result<(), StoreError> {
        let document = self.documents.get_document();
        self.execute(None, |store| store.add(key, &document))?;

        for _ in 0..self.ratio {
            let (_, cas) = self.execute(sampled.then_some(OpKind::Gets), |store| store.gets(key))?;

            let document = self.documents.get_document();
            let outcome = self.execute(sampled.then_some(OpKind::Cas), |store| {
                store.cas(key, cas, &document)
            })?;
            if outcome == CasOutcome::Conflict {
                tracing::info!(%key, "could not store with cas");
            }
        }
        Ok(())
    }

    /// Runs one store operation, counting it on success and timing it if `measure` is set.
    fn execute<T>(
        &mut self,
        measure: Option<OpKind>,
        op: impl FnOnce(&S) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let Some(kind) = measure else {
            let value = op(&self.store)?;
            self.recorder.incr_total_ops();
            return Ok(value);
        };

        let start = Instant::now();
        let value = op(&self.store)?;
        let latency = start.elapsed();
        self.recorder.incr_total_ops();
        self.recorder.add_measure(kind, latency);
        Ok(value)
    }
}
