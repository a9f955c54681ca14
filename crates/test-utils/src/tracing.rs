//! Log output for tests.

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Install a fmt subscriber honoring `RUST_LOG`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}
