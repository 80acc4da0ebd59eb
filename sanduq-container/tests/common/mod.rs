//! Helpers shared by the integration tests.

use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness.
///
/// `RUST_LOG=sanduq_container=trace cargo test` shows every lookup.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
