//! Functions host probe.
//!
//! Launches a local Functions host (`func start` by default), watches its
//! standard output for the `Now listening on: <address>` readiness marker and
//! hands back a [`RunningFunc`] handle that owns the process until it is
//! stopped.
//!
//! # Usage
//!
//! ```no_run
//! use func_probe::{with_running_func, ProbeConfig};
//!
//! # async fn run() -> Result<(), func_probe::ProbeError> {
//! let config = ProbeConfig::from_env()?;
//!
//! let status = with_running_func(config, |endpoint| async move {
//!     reqwest_like_get(endpoint.url("api/HttpTest/ping")).await
//! })
//! .await?;
//! # let _ = status;
//! # Ok(())
//! # }
//! # async fn reqwest_like_get(_url: String) -> u16 { 200 }
//! ```
//!
//! The host is always terminated when the closure returns or panics.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod probe;
pub mod readiness;

pub use config::ProbeConfig;
pub use error::{ConfigError, ProbeError};
pub use lifecycle::{with_probe, with_running_func};
pub use probe::{ProbeState, ProcessProbe, RunningFunc, StopOutcome};
pub use readiness::Endpoint;
