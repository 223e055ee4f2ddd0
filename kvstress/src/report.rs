//! Turns aggregated results into latency percentiles and throughput, and prints them.

use std::time::Duration;

use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::metrics::{OpKind, RunResults};

/// Percentiles reported for every operation kind.
pub const PERCENTILES: [f64; 4] = [0.50, 0.75, 0.95, 0.99];

/// Latency statistics of one operation kind.
#[derive(Clone, Debug, PartialEq)]
pub struct KindSummary {
    /// The operation kind.
    pub kind: OpKind,
    /// Number of retained samples.
    pub count: usize,
    /// Mean latency.
    pub avg: Duration,
    /// Latency at each of [`PERCENTILES`].
    pub percentiles: Vec<Duration>,
}

/// Everything printed at the end of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    /// Executed operations.
    pub total_ops: u64,
    /// Operations whose latency was retained.
    pub measured_ops: u64,
    /// Documents assigned to workload units.
    pub planned_docs: u64,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
    /// Executed operations per second.
    pub throughput: f64,
    /// Per kind statistics, ordered by kind.
    pub kinds: Vec<KindSummary>,
    /// Elapsed time of the fastest and slowest workload unit.
    pub units: Option<(Duration, Duration)>,
}

impl Summary {
    /// Computes the summary of `results` for a run that took `elapsed`.
    pub fn new(results: &RunResults, elapsed: Duration) -> Self {
        let kinds = results
            .measures
            .iter()
            .filter_map(|(kind, samples)| summarize(kind, samples))
            .collect();

        let throughput = if elapsed.is_zero() {
            0.0
        } else {
            results.total_ops as f64 / elapsed.as_secs_f64()
        };

        Summary {
            total_ops: results.total_ops,
            measured_ops: results.measured_ops,
            planned_docs: results.planned_docs,
            elapsed,
            throughput,
            kinds,
            units: results.elapsed_range(),
        }
    }

    /// Emits the totals as a log event.
    pub fn log(&self) {
        tracing::info!(
            total_ops = self.total_ops,
            measured_ops = self.measured_ops,
            planned_docs = self.planned_docs,
            elapsed = ?self.elapsed,
            throughput = self.throughput,
            "workload finished"
        );
    }

    /// Prints the summary to stdout.
    pub fn print(&self) {
        println!();
        println!("{}", "## RESULTS".bold());
        println!(
            "Operations: measured {} out of total {} ({} documents)",
            self.measured_ops.bold(),
            self.total_ops.bold(),
            self.planned_docs,
        );

        for kind in &self.kinds {
            println!(
                "{} ({} samples)",
                format!("{}:", kind.kind.as_str().to_uppercase()).bold().green(),
                kind.count.bold()
            );
            print_percentiles(kind);
        }

        println!();
        print!("{} {:.2?}", "Elapsed:".bold(), self.elapsed);
        println!("; {:.2} operations/s", self.throughput.bold());
        if let Some((shortest, longest)) = self.units {
            println!("  shortest workload: {shortest:.2?}; longest workload: {longest:.2?}");
        }
    }
}

fn print_percentiles(kind: &KindSummary) {
    let percentiles: Vec<_> = PERCENTILES
        .iter()
        .zip(&kind.percentiles)
        .map(|(q, value)| format!("p{}: {value:.2?}", (q * 100.0).round()))
        .collect();
    println!(
        "  avg: {:.2?}; {}",
        kind.avg.bold(),
        percentiles.join("; ")
    );
}

fn summarize(kind: OpKind, samples: &[Duration]) -> Option<KindSummary> {
    if samples.is_empty() {
        return None;
    }

    let mut sketch = DDSketch::default();
    for sample in samples {
        sketch.add(sample.as_secs_f64());
    }

    let avg = sketch.sum()? / sketch.count() as f64;
    let percentiles = PERCENTILES
        .iter()
        .map(|q| sketch.quantile(*q).ok().flatten().map(Duration::from_secs_f64))
        .collect::<Option<Vec<_>>>()?;

    Some(KindSummary {
        kind,
        count: sketch.count(),
        avg: Duration::from_secs_f64(avg),
        percentiles,
    })
}
