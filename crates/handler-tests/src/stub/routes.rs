//! HTTP routes for the stub host.

use super::handlers;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Mount point of the `HttpTest` function, as the Functions host exposes it.
pub const FUNCTION_PREFIX: &str = "/api/HttpTest";

/// Build the stub routes.
///
/// Creates an Axum router with, under `/api/HttpTest`:
/// - `GET /ping` - answers `"PONG"`
/// - `GET /path/:foo` - echoes the path segment
/// - `GET /get` - echoes the query string
/// - `POST /post` - echoes the JSON body and query string
/// - `GET /status` - answers with the requested status
/// - `GET /headers` - echoes request headers, copies the custom header back
///
/// Plus TraceLayer for request logging and a 30 second request timeout.
pub fn build_routes() -> Router {
    let function_routes = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/path/:foo", get(handlers::path_param))
        .route("/get", get(handlers::get_params))
        .route("/post", post(handlers::post_params))
        .route("/status", get(handlers::status))
        .route("/headers", get(handlers::headers));

    Router::new()
        .nest(FUNCTION_PREFIX, function_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
