use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per process.
///
/// The filter comes from `CONVOY_LOG`, then `RUST_LOG`, then `info`.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = std::env::var("CONVOY_LOG")
            .ok()
            .and_then(|spec| EnvFilter::try_new(spec).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"));
        // Another subscriber may already be installed by the test binary.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}
