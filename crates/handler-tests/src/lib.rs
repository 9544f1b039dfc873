//! HttpTest Handler Conformance Suite
//!
//! Drives a local Functions host through the `HttpTest` function's HTTP
//! contract: plain GET, path parameters, query and JSON body parsing,
//! arbitrary status codes and custom header round-trips.
//!
//! # Hosts
//!
//! - Default: the bundled `func-stub` binary, which prints the same
//!   `Now listening on:` marker as the real host and serves the same routes.
//! - `func-runtime` feature: the real host, launched from `FUNC_COMMAND` /
//!   `FUNC_ARGS` (default `func start`) in `FUNC_WORKING_DIR`.
//!
//! # Usage
//!
//! ```bash
//! # Against the stub (no Functions tooling required)
//! cargo test -p handler-tests
//!
//! # Against a real Functions app
//! FUNC_WORKING_DIR=./my-func-app cargo test -p handler-tests --features func-runtime
//! ```

pub mod fixtures;
pub mod logging;
pub mod scenarios;
pub mod stub;
