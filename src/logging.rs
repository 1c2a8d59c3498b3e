use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const TEST_FILTER: &str = "kpi_monitoring=debug";

/// Install the global subscriber for a host application.
///
/// `RUST_LOG` overrides the level (default `info`). Per-record resolution fallbacks and
/// duplicate slots/targets log at `debug`; orphans and placeholders at `warn`; one `info`
/// line per aggregation pass.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Debug output for this crate only, captured by the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new(TEST_FILTER))
        .with_test_writer()
        .try_init();
}
