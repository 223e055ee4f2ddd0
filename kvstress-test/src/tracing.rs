//! Log output for tests.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Filter directives used when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &[&str] = &["kvstress=trace", "kvstress_test=trace"];

/// Routes log events of the load generator to the output captured by the test runner.
///
/// Other crates only log errors. Setting `RUST_LOG` replaces these defaults entirely. Calling
/// this more than once, or from several tests, is fine.
///
/// # Example
///
/// ```
/// kvstress_test::tracing::init();
/// ```
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_thread_names(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

fn filter() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    DEFAULT_DIRECTIVES
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(EnvFilter::new("error"), EnvFilter::add_directive)
}
