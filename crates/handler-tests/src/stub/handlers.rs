//! `HttpTest` function handlers.

use super::errors::StubError;
use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::instrument;

/// Request header echoed back by [`headers`].
pub const CUSTOM_HEADER_IN: &str = "x-custom-header-in";

/// Response header carrying the echoed value.
pub const CUSTOM_HEADER_OUT: &str = "x-custom-header-out";

/// `GET /ping` answers `"PONG"`.
#[instrument(skip_all, name = "func.stub.ping")]
pub async fn ping() -> Json<&'static str> {
    Json("PONG")
}

/// `GET /path/:foo` echoes the segment under the parameter name.
#[instrument(skip_all, name = "func.stub.path")]
pub async fn path_param(Path(foo): Path<String>) -> Json<Value> {
    Json(json!({ "foo": foo }))
}

/// `GET /get` echoes the query string.
#[instrument(skip_all, name = "func.stub.get")]
pub async fn get_params(Query(query): Query<BTreeMap<String, String>>) -> Json<Value> {
    Json(json!({ "query": query }))
}

/// `POST /post` echoes the JSON body and the query string.
///
/// An empty body is echoed as `null`.
#[instrument(skip_all, name = "func.stub.post")]
pub async fn post_params(
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, StubError> {
    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| StubError::InvalidBody(e.to_string()))?
    };

    Ok(Json(json!({ "body": body, "query": query })))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    status: Option<String>,
}

/// `GET /status?status=N` answers with status N.
#[instrument(skip_all, name = "func.stub.status")]
pub async fn status(Query(query): Query<StatusQuery>) -> Result<impl IntoResponse, StubError> {
    let raw = query
        .status
        .ok_or_else(|| StubError::InvalidStatus("missing 'status' query parameter".to_string()))?;

    let code = raw
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| StubError::InvalidStatus(format!("'{}' is not an HTTP status", raw)))?;

    Ok((code, Json(json!({ "status": code.as_u16() }))))
}

/// `GET /headers` echoes every request header and copies
/// `x-custom-header-in` to `x-custom-header-out`.
#[instrument(skip_all, name = "func.stub.headers")]
pub async fn headers(request_headers: HeaderMap) -> impl IntoResponse {
    let mut echoed: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in &request_headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match echoed.entry(name.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }

    let mut response_headers = HeaderMap::new();
    if let Some(value) = request_headers.get(CUSTOM_HEADER_IN) {
        response_headers.insert(CUSTOM_HEADER_OUT, value.clone());
    }

    (response_headers, Json(json!({ "headers": echoed })))
}
