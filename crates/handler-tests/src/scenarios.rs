//! HttpTest conformance scenarios.
//!
//! Each scenario issues one request against the shared endpoint and checks
//! the status, body and headers against literal expectations. Scenarios
//! report failures instead of panicking so one run surfaces every broken
//! route, and so the host is always torn down before the suite fails.

use crate::fixtures::http_test_client::{HandlerResponse, HttpTestClient, HttpTestClientError};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Maximum length of a body quoted in a failure message.
const MAX_BODY_IN_MESSAGE: usize = 256;

/// Why a scenario failed.
#[derive(Debug, Error)]
pub enum ScenarioFailure {
    #[error("request failed: {0}")]
    Request(#[from] HttpTestClientError),

    #[error("expected status {expected}, got {actual}")]
    Status { expected: u16, actual: u16 },

    #[error("expected body {expected}, got {actual}")]
    Body { expected: String, actual: String },

    #[error("expected header {name}: {expected}, got {actual:?}")]
    Header {
        name: String,
        expected: String,
        actual: Option<String>,
    },
}

/// Outcome of one scenario.
#[derive(Debug)]
pub struct ScenarioReport {
    pub name: &'static str,
    pub outcome: Result<(), ScenarioFailure>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(()) => write!(f, "PASS {}", self.name),
            Err(e) => write!(f, "FAIL {}: {}", self.name, e),
        }
    }
}

/// Run every scenario sequentially and collect the reports.
pub async fn run_all(client: &HttpTestClient) -> Vec<ScenarioReport> {
    let mut reports = Vec::with_capacity(7);

    reports.push(report("handles a simple GET request", simple_get(client).await));
    reports.push(report("parses path params", path_params(client).await));
    reports.push(report("parses params of GET request", get_params(client).await));
    reports.push(report("parses params of POST request", post_params(client).await));
    reports.push(report("handles 404 status", status_passthrough(client, 404).await));
    reports.push(report("handles 500 status", status_passthrough(client, 500).await));
    reports.push(report(
        "parses and responds with custom headers",
        custom_headers(client).await,
    ));

    reports
}

/// Run the client property checks and collect the reports.
///
/// These share the endpoint of [`run_all`]; callers run both inside one
/// host scope.
pub async fn run_properties(client: &HttpTestClient) -> Vec<ScenarioReport> {
    vec![
        report(
            "returns error statuses as data",
            statuses_are_data(client).await,
        ),
        report(
            "decodes query and body independently",
            query_and_body_independent(client).await,
        ),
    ]
}

/// Failure lines of a run, empty when everything passed.
pub fn failures(reports: &[ScenarioReport]) -> Vec<String> {
    reports
        .iter()
        .filter(|r| !r.passed())
        .map(ToString::to_string)
        .collect()
}

fn report(name: &'static str, outcome: Result<(), ScenarioFailure>) -> ScenarioReport {
    match &outcome {
        Ok(()) => tracing::info!(target: "func.scenario", scenario = name, "Scenario passed"),
        Err(e) => tracing::warn!(target: "func.scenario", scenario = name, error = %e, "Scenario failed"),
    }
    ScenarioReport { name, outcome }
}

/// `GET ping` answers 200 with `"PONG"`.
pub async fn simple_get(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    let response = client.ping().await?;
    expect_status(&response, 200)?;
    expect_body_eq(&response, &json!("PONG"))
}

/// The path segment is echoed under the route's parameter name.
pub async fn path_params(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    let response = client.path("foo").await?;
    expect_status(&response, 200)?;
    expect_body_eq(&response, &json!({ "foo": "foo" }))
}

/// Query parameters are echoed under `query`.
pub async fn get_params(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    let response = client.get_with_query(&[("param1", "param1")]).await?;
    expect_status(&response, 200)?;
    expect_body_eq(&response, &json!({ "query": { "param1": "param1" } }))
}

/// JSON body and query parameters are echoed together.
pub async fn post_params(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    let response = client
        .post_with_query(&[("param1", "param1")], &json!({ "data": "data" }))
        .await?;
    expect_status(&response, 200)?;
    expect_body_eq(
        &response,
        &json!({
            "body": { "data": "data" },
            "query": { "param1": "param1" }
        }),
    )
}

/// The handler can answer with an arbitrary status code.
pub async fn status_passthrough(client: &HttpTestClient, code: u16) -> Result<(), ScenarioFailure> {
    let response = client.status(code).await?;
    expect_status(&response, code)
}

/// Request headers reach the handler and a response header comes back.
pub async fn custom_headers(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    let response = client.headers(&[("x-custom-header-in", "value")]).await?;
    expect_status(&response, 200)?;
    expect_body_contains(
        &response,
        &json!({ "headers": { "x-custom-header-in": "value" } }),
    )?;
    expect_header(&response, "x-custom-header-out", "value")
}

/// 404 and 500 come back as responses, not client errors.
pub async fn statuses_are_data(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    for code in [404, 500] {
        let response = client.status(code).await?;
        expect_status(&response, code)?;
    }
    Ok(())
}

/// A GET echoes only its query; a POST without query echoes its body.
pub async fn query_and_body_independent(client: &HttpTestClient) -> Result<(), ScenarioFailure> {
    let query_only = client
        .get_with_query(&[("param1", "a"), ("param2", "b")])
        .await?;
    expect_status(&query_only, 200)?;
    expect_body_eq(
        &query_only,
        &json!({ "query": { "param1": "a", "param2": "b" } }),
    )?;

    let body_only = client.post_with_query(&[], &json!({ "data": "data" })).await?;
    expect_status(&body_only, 200)?;
    expect_body_contains(&body_only, &json!({ "body": { "data": "data" } }))
}

pub fn expect_status(response: &HandlerResponse, expected: u16) -> Result<(), ScenarioFailure> {
    let actual = response.status.as_u16();
    if actual == expected {
        Ok(())
    } else {
        Err(ScenarioFailure::Status { expected, actual })
    }
}

pub fn expect_body_eq(response: &HandlerResponse, expected: &Value) -> Result<(), ScenarioFailure> {
    if &response.body == expected {
        Ok(())
    } else {
        Err(body_mismatch(&response.body, expected))
    }
}

pub fn expect_body_contains(
    response: &HandlerResponse,
    expected: &Value,
) -> Result<(), ScenarioFailure> {
    if json_contains(&response.body, expected) {
        Ok(())
    } else {
        Err(body_mismatch(&response.body, expected))
    }
}

pub fn expect_header(
    response: &HandlerResponse,
    name: &str,
    expected: &str,
) -> Result<(), ScenarioFailure> {
    let actual = response.header(name);
    if actual == Some(expected) {
        Ok(())
    } else {
        Err(ScenarioFailure::Header {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: actual.map(str::to_string),
        })
    }
}

/// Whether `actual` matches `expected` as a recursive object subset.
///
/// Objects may carry extra keys; arrays must have the same length and match
/// element-wise; everything else compares by equality.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(key, value)| {
            actual
                .get(key)
                .is_some_and(|actual_value| json_contains(actual_value, value))
        }),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual
                    .iter()
                    .zip(expected)
                    .all(|(actual, expected)| json_contains(actual, expected))
        }
        (actual, expected) => actual == expected,
    }
}

fn body_mismatch(actual: &Value, expected: &Value) -> ScenarioFailure {
    ScenarioFailure::Body {
        expected: truncate(expected.to_string()),
        actual: truncate(actual.to_string()),
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_BODY_IN_MESSAGE {
        let mut cut = MAX_BODY_IN_MESSAGE;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...[truncated]");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    fn response(status: u16, body: Value) -> HandlerResponse {
        HandlerResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body,
        }
    }

    #[test]
    fn test_json_contains_allows_extra_keys() {
        let actual = json!({
            "headers": {
                "x-custom-header-in": "value",
                "host": "127.0.0.1:7071",
                "accept": "*/*"
            },
            "method": "GET"
        });

        assert!(json_contains(
            &actual,
            &json!({ "headers": { "x-custom-header-in": "value" } })
        ));
    }

    #[test]
    fn test_json_contains_rejects_missing_or_different_values() {
        let actual = json!({ "headers": { "x-custom-header-in": "other" } });

        assert!(!json_contains(
            &actual,
            &json!({ "headers": { "x-custom-header-in": "value" } })
        ));
        assert!(!json_contains(&actual, &json!({ "query": {} })));
        assert!(!json_contains(&json!("PONG"), &json!({ "headers": {} })));
    }

    #[test]
    fn test_json_contains_arrays_match_elementwise() {
        assert!(json_contains(
            &json!([{ "a": 1, "b": 2 }, 3]),
            &json!([{ "a": 1 }, 3])
        ));
        assert!(!json_contains(&json!([1, 2, 3]), &json!([1, 2])));
    }

    #[test]
    fn test_expect_status() {
        assert!(expect_status(&response(404, Value::Null), 404).is_ok());

        let err = expect_status(&response(200, Value::Null), 500).unwrap_err();
        assert_eq!(err.to_string(), "expected status 500, got 200");
    }

    #[test]
    fn test_expect_body_eq_is_exact() {
        let response = response(200, json!({ "query": { "param1": "param1" }, "extra": 1 }));

        assert!(expect_body_contains(&response, &json!({ "query": { "param1": "param1" } })).is_ok());
        assert!(matches!(
            expect_body_eq(&response, &json!({ "query": { "param1": "param1" } })),
            Err(ScenarioFailure::Body { .. })
        ));
    }

    #[test]
    fn test_expect_header_reports_missing_value() {
        let err = expect_header(&response(200, Value::Null), "x-custom-header-out", "value")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "expected header x-custom-header-out: value, got None"
        );
    }

    #[test]
    fn test_body_mismatch_truncates_long_bodies() {
        let long = Value::String("a".repeat(500));
        let err = body_mismatch(&long, &json!("PONG"));

        let ScenarioFailure::Body { actual, expected } = err else {
            panic!("expected a body failure");
        };
        assert_eq!(expected, r#""PONG""#);
        assert!(actual.ends_with("...[truncated]"));
        assert!(actual.len() <= MAX_BODY_IN_MESSAGE + 15);
    }

    #[test]
    fn test_failures_lists_only_failed_reports() {
        let reports = vec![
            ScenarioReport {
                name: "handles 404 status",
                outcome: Ok(()),
            },
            ScenarioReport {
                name: "handles 500 status",
                outcome: Err(ScenarioFailure::Status {
                    expected: 500,
                    actual: 200,
                }),
            },
        ];

        assert_eq!(
            failures(&reports),
            vec!["FAIL handles 500 status: expected status 500, got 200".to_string()]
        );
        assert_eq!(reports[0].to_string(), "PASS handles 404 status");
    }
}
