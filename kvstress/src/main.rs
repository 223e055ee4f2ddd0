//! Command line entry point of the load generator.
//!
//! Runs the configured workload against a memcached cluster and prints latency percentiles
//! and throughput once all clients have finished. Log output goes to stderr.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use kvstress::config::Args;
use kvstress::store::MemcachedCluster;
use kvstress::{Dispatcher, RunConfig, Summary, observability};

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    observability::initialize_tracing();

    run(args).inspect_err(|err| {
        let error: &(dyn std::error::Error + 'static) = err.as_ref();
        tracing::error!(error, "load test failed");
    })
}

fn run(args: Args) -> Result<()> {
    let config = RunConfig::load(args).context("failed to load configuration")?;
    tracing::info!(?config, "starting workload");
    let config = Arc::new(config);

    let cluster = MemcachedCluster::new(&config);
    let mut dispatcher =
        Dispatcher::init(Arc::clone(&config), cluster).context("failed to connect clients")?;

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message(format!("Running workload {}:", config.workload));
    bar.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let outcome = dispatcher.dispatch_workload();
    let elapsed = start.elapsed();
    bar.finish_and_clear();

    outcome.context("failed to run workload")?;

    let summary = Summary::new(&dispatcher.results(), elapsed);
    summary.log();
    summary.print();

    Ok(())
}
