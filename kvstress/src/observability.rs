//! Logging setup for the `kvstress` binary.

use std::env;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Installs a global subscriber that writes log events to stderr.
///
/// Stdout is left to the results report. The verbosity is controlled with `RUST_LOG`, see
/// [`parse_rust_log`].
pub fn initialize_tracing() {
    let (level, env_filter) = parse_rust_log();
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(LevelFilter::from(level)))
        .with(env_filter)
        .init();
}

/// Derives the log level and filter directives from the `RUST_LOG` environment variable.
///
/// A plain level such as `debug` is applied on top of the default directives, anything else is
/// used as filter directives verbatim. Without `RUST_LOG`, the level is `INFO`.
pub fn parse_rust_log() -> (Level, EnvFilter) {
    let value = env::var(EnvFilter::DEFAULT_ENV).ok();
    parse_filter(value.as_deref())
}

fn parse_filter(value: Option<&str>) -> (Level, EnvFilter) {
    let level = match value {
        Some(value) => match value.parse::<Level>() {
            Ok(level) => level,
            Err(_) => return (Level::TRACE, EnvFilter::new(value)),
        },
        None => Level::INFO,
    };

    // The maximum verbosity that will be logged, filtered down to `level`.
    let env_filter = EnvFilter::new("INFO,kvstress=TRACE");

    (level, env_filter)
}
