//! Tracing setup for the suite and the stub host.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for test runs: probe lifecycle, host output and scenarios.
const TEST_FILTER: &str = "func=info,handler_tests=debug";

/// Default filter for the stub host.
const STUB_FILTER: &str = "func_stub=debug,handler_tests=debug,tower_http=debug";

/// Install a test-writer subscriber once per test binary.
///
/// `RUST_LOG` overrides the default filter. Later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| TEST_FILTER.into()),
        )
        .with_test_writer()
        .try_init();
}

/// Install the stub host's subscriber.
///
/// Logs go to stderr; stdout is reserved for the host banner and the
/// readiness marker.
pub fn init_stub_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| STUB_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
