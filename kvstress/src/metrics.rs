//! Latency samples and operation counters, and how they merge.
//!
//! Results flow bottom-up: every workload unit produces a [`UnitReport`], each client handle
//! merges the reports of its units into a [`RunResults`], and the dispatcher merges the results
//! of all clients. Merging concatenates latency samples per [`OpKind`] and sums counters, so it
//! is associative and never drops a kind.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The store operations that are timed.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum OpKind {
    /// Unconditional write.
    Set,
    /// Plain read.
    Get,
    /// Read returning a version token.
    Gets,
    /// Conditional write with a version token.
    Cas,
}

impl OpKind {
    /// Returns the label used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Set => "set",
            OpKind::Get => "get",
            OpKind::Gets => "gets",
            OpKind::Cas => "cas",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency samples grouped by operation kind, in recording order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Measures(BTreeMap<OpKind, Vec<Duration>>);

impl Measures {
    /// Appends a sample for `kind`.
    pub fn record(&mut self, kind: OpKind, latency: Duration) {
        self.0.entry(kind).or_default().push(latency);
    }

    /// Returns the samples recorded for `kind`.
    pub fn get(&self, kind: OpKind) -> &[Duration] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Iterates over all kinds that have samples.
    pub fn iter(&self) -> impl Iterator<Item = (OpKind, &[Duration])> {
        self.0.iter().map(|(kind, samples)| (*kind, samples.as_slice()))
    }

    /// Total number of samples across all kinds.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Returns `true` if no samples were recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends all samples of `other` after the samples of `self`.
    pub fn merge(&mut self, other: Measures) {
        for (kind, samples) in other.0 {
            self.0.entry(kind).or_default().extend(samples);
        }
    }
}

/// The outcome of a single workload unit.
#[derive(Clone, Debug, Default)]
pub struct UnitReport {
    /// Name of the unit, `{client}/workload-{n}`.
    pub name: String,
    /// Number of iterations the unit was assigned.
    pub amount: u64,
    /// Successfully executed store operations.
    pub total_ops: u64,
    /// Operations whose latency was retained.
    pub measured_ops: u64,
    /// Retained latency samples.
    pub measures: Measures,
    /// Wall-clock time from the first to the last iteration.
    pub elapsed: Duration,
}

/// Aggregated results of any number of workload units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunResults {
    /// Retained latency samples.
    pub measures: Measures,
    /// Successfully executed store operations.
    pub total_ops: u64,
    /// Operations whose latency was retained.
    pub measured_ops: u64,
    /// Elapsed time of every unit.
    pub thread_elapsed: Vec<Duration>,
    /// Documents assigned to units, after rounding down the splits.
    pub planned_docs: u64,
}

impl RunResults {
    /// Merges `other` into `self`.
    pub fn merge(&mut self, other: RunResults) {
        self.measures.merge(other.measures);
        self.total_ops += other.total_ops;
        self.measured_ops += other.measured_ops;
        self.thread_elapsed.extend(other.thread_elapsed);
        self.planned_docs += other.planned_docs;
    }

    /// The shortest and longest unit elapsed time, if any unit finished.
    pub fn elapsed_range(&self) -> Option<(Duration, Duration)> {
        let shortest = self.thread_elapsed.iter().min()?;
        let longest = self.thread_elapsed.iter().max()?;
        Some((*shortest, *longest))
    }
}

impl From<UnitReport> for RunResults {
    fn from(report: UnitReport) -> Self {
        RunResults {
            measures: report.measures,
            total_ops: report.total_ops,
            measured_ops: report.measured_ops,
            thread_elapsed: vec![report.elapsed],
            planned_docs: report.amount,
        }
    }
}

impl FromIterator<RunResults> for RunResults {
    fn from_iter<I: IntoIterator<Item = RunResults>>(iter: I) -> Self {
        iter.into_iter().fold(RunResults::default(), |mut acc, results| {
            acc.merge(results);
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn results(samples: &[(OpKind, u64)], total_ops: u64, elapsed: u64) -> RunResults {
        let mut measures = Measures::default();
        for (kind, millis) in samples {
            measures.record(*kind, ms(*millis));
        }
        RunResults {
            measured_ops: samples.len() as u64,
            measures,
            total_ops,
            thread_elapsed: vec![ms(elapsed)],
            planned_docs: total_ops / 2,
        }
    }

    #[test]
    fn merge_keeps_kinds_present_in_one_side() {
        let mut a = results(&[(OpKind::Set, 1), (OpKind::Get, 2)], 10, 100);
        let b = results(&[(OpKind::Gets, 3), (OpKind::Cas, 4), (OpKind::Get, 5)], 20, 50);
        a.merge(b);

        assert_eq!(a.measures.get(OpKind::Set), &[ms(1)]);
        assert_eq!(a.measures.get(OpKind::Get), &[ms(2), ms(5)]);
        assert_eq!(a.measures.get(OpKind::Gets), &[ms(3)]);
        assert_eq!(a.measures.get(OpKind::Cas), &[ms(4)]);
        assert_eq!(a.total_ops, 30);
        assert_eq!(a.measured_ops, 5);
        assert_eq!(a.thread_elapsed, vec![ms(100), ms(50)]);
        assert_eq!(a.planned_docs, 15);
        assert_eq!(a.elapsed_range(), Some((ms(50), ms(100))));
    }

    #[test]
    fn merge_is_associative() {
        let a = results(&[(OpKind::Set, 1), (OpKind::Get, 2)], 10, 1);
        let b = results(&[(OpKind::Get, 3)], 20, 2);
        let c = results(&[(OpKind::Set, 4), (OpKind::Cas, 5)], 30, 3);

        let mut stepwise: RunResults = [a.clone(), b.clone()].into_iter().collect();
        stepwise.merge(c.clone());

        let direct: RunResults = [a, b, c].into_iter().collect();
        assert_eq!(stepwise, direct);
        assert_eq!(direct.measures.get(OpKind::Set), &[ms(1), ms(4)]);
    }

    #[test]
    fn unit_report_conversion() {
        let mut measures = Measures::default();
        measures.record(OpKind::Set, ms(7));
        let report = UnitReport {
            name: "client-1/workload-1".into(),
            amount: 5,
            total_ops: 10,
            measured_ops: 1,
            measures,
            elapsed: ms(42),
        };

        let results = RunResults::from(report);
        assert_eq!(results.total_ops, 10);
        assert_eq!(results.measured_ops, 1);
        assert_eq!(results.planned_docs, 5);
        assert_eq!(results.thread_elapsed, vec![ms(42)]);
        assert_eq!(results.measures.len(), 1);
    }

    #[test]
    fn empty_results() {
        let results = RunResults::default();
        assert!(results.measures.is_empty());
        assert_eq!(results.elapsed_range(), None);
    }
}
