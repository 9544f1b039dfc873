//! func-stub
//!
//! Stand-in for `func start`: serves the `HttpTest` function and announces
//! its address with the same `Now listening on:` line as the real host.

use handler_tests::logging::init_stub_logging;
use handler_tests::stub::{build_routes, StubConfig};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_stub_logging();

    let config = StubConfig::from_env().map_err(|e| {
        error!(target: "func.stub", "Failed to load configuration: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    let addr = listener.local_addr()?;

    info!(target: "func.stub", %addr, "Stub host bound");

    // stdout carries the banner the probe parses; logs go to stderr
    println!("Azure Functions Core Tools (func-stub)");
    println!();
    println!("Functions:");
    println!();
    println!("\tHttpTest: [GET,POST] http://{}/api/HttpTest/{{*route}}", addr);
    println!();
    println!("Now listening on: http://{}", addr);
    println!("Application started. Press Ctrl+C to shut down.");

    axum::serve(listener, build_routes())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Application is shutting down...");
    info!(target: "func.stub", "Stub host shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!(target: "func.stub", "Received SIGINT, shutting down"),
            Err(e) => error!(target: "func.stub", "Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(target: "func.stub", "Received SIGTERM, shutting down");
            }
            Err(e) => {
                error!(target: "func.stub", "Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
