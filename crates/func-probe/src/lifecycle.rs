//! Scoped host lifecycle.
//!
//! Start the host, hand its endpoint to a closure, and always stop the host
//! afterwards, including when the closure panics.

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::probe::ProcessProbe;
use crate::readiness::Endpoint;
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Run `body` against a freshly started host built from `config`.
///
/// See [`with_probe`].
pub async fn with_running_func<F, Fut, T>(config: ProbeConfig, body: F) -> Result<T, ProbeError>
where
    F: FnOnce(Endpoint) -> Fut,
    Fut: Future<Output = T>,
{
    with_probe(ProcessProbe::new(config), body).await
}

/// Start `probe`, run `body` with the resolved endpoint, then stop the host.
///
/// Teardown runs exactly once whether `body` returns or panics. A panic
/// is resumed after teardown. Stop failures are logged, not returned.
///
/// # Errors
///
/// Returns the startup error if the host never became ready; `body` is not
/// run in that case.
pub async fn with_probe<F, Fut, T>(probe: ProcessProbe, body: F) -> Result<T, ProbeError>
where
    F: FnOnce(Endpoint) -> Fut,
    Fut: Future<Output = T>,
{
    let running = probe.start().await?;
    let endpoint = running.endpoint().clone();

    let outcome = AssertUnwindSafe(body(endpoint)).catch_unwind().await;

    match running.stop().await {
        Ok(stop) => debug!(
            target: "func.probe",
            status = %stop.status,
            forced = stop.forced,
            "Teardown complete"
        ),
        Err(e) => warn!(target: "func.probe", error = %e, "Teardown failed"),
    }

    match outcome {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}
