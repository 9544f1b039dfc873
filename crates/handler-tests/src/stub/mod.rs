//! Stand-in Functions host.
//!
//! Serves the `HttpTest` function contract so the suite can run without the
//! Functions tooling installed. The `func-stub` binary wraps these routes
//! and prints the same startup banner and readiness marker as `func start`.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod routes;

pub use config::StubConfig;
pub use errors::StubError;
pub use routes::build_routes;
