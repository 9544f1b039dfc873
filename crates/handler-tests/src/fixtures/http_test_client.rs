//! HttpTest function client fixture.
//!
//! Provides an HTTP client for the `HttpTest` function's routes under
//! `{endpoint}/api/HttpTest/`. Non-2xx statuses are returned as data, never
//! as errors, so callers inspect status codes explicitly.

use func_probe::Endpoint;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Route prefix of the function under test.
pub const HTTP_TEST_FUNCTION: &str = "api/HttpTest";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HttpTest client errors.
///
/// Only transport-level failures; HTTP error statuses are not errors.
#[derive(Debug, Error)]
pub enum HttpTestClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Response from the function, with the body decoded the way a JavaScript
/// HTTP client would: JSON when it parses, otherwise the raw text as a string.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    /// Response status code.
    pub status: StatusCode,

    /// Response headers.
    pub headers: HeaderMap,

    /// Decoded body.
    pub body: Value,
}

impl HandlerResponse {
    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Decode a response body: JSON if possible, otherwise a JSON string.
pub fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Client for the `HttpTest` function.
pub struct HttpTestClient {
    endpoint: Endpoint,
    http_client: Client,
}

impl HttpTestClient {
    /// Create a new client for the host at `endpoint`.
    pub fn new(endpoint: Endpoint) -> Result<Self, HttpTestClientError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HttpTestClientError::ClientBuild(e.to_string()))?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// Get the host endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the HTTP client for custom requests.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Full URL of a route of the function.
    pub fn route_url(&self, route: &str) -> String {
        self.endpoint.url(&format!(
            "{}/{}",
            HTTP_TEST_FUNCTION,
            route.trim_start_matches('/')
        ))
    }

    /// Simple GET.
    ///
    /// # Endpoint
    ///
    /// `GET /api/HttpTest/ping`
    pub async fn ping(&self) -> Result<HandlerResponse, HttpTestClientError> {
        self.send(self.http_client.get(self.route_url("ping"))).await
    }

    /// Path parameter echo.
    ///
    /// # Endpoint
    ///
    /// `GET /api/HttpTest/path/{value}`
    pub async fn path(&self, value: &str) -> Result<HandlerResponse, HttpTestClientError> {
        let url = self.path_url(value)?;
        self.send(self.http_client.get(url)).await
    }

    /// URL of the path echo route with `value` percent-encoded as one segment.
    pub fn path_url(&self, value: &str) -> Result<Url, HttpTestClientError> {
        let mut url = Url::parse(&self.route_url("path"))
            .map_err(|e| HttpTestClientError::InvalidUrl(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|()| {
                HttpTestClientError::InvalidUrl(format!("{} cannot be a base URL", self.endpoint))
            })?
            .push(value);

        Ok(url)
    }

    /// Query parameter echo.
    ///
    /// # Endpoint
    ///
    /// `GET /api/HttpTest/get?{query}`
    pub async fn get_with_query(
        &self,
        query: &[(&str, &str)],
    ) -> Result<HandlerResponse, HttpTestClientError> {
        let request = self.http_client.get(self.route_url("get")).query(query);
        self.send(request).await
    }

    /// JSON body and query parameter echo.
    ///
    /// # Endpoint
    ///
    /// `POST /api/HttpTest/post?{query}`
    pub async fn post_with_query(
        &self,
        query: &[(&str, &str)],
        body: &Value,
    ) -> Result<HandlerResponse, HttpTestClientError> {
        let request = self
            .http_client
            .post(self.route_url("post"))
            .query(query)
            .json(body);
        self.send(request).await
    }

    /// Ask the handler to respond with an arbitrary status.
    ///
    /// # Endpoint
    ///
    /// `GET /api/HttpTest/status?status={code}`
    pub async fn status(&self, code: u16) -> Result<HandlerResponse, HttpTestClientError> {
        let request = self
            .http_client
            .get(self.route_url("status"))
            .query(&[("status", code)]);
        self.send(request).await
    }

    /// Send custom request headers.
    ///
    /// # Endpoint
    ///
    /// `GET /api/HttpTest/headers`
    pub async fn headers(
        &self,
        headers: &[(&str, &str)],
    ) -> Result<HandlerResponse, HttpTestClientError> {
        let mut request = self.http_client.get(self.route_url("headers"));

        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        self.send(request).await
    }

    /// Send a request and decode the response, whatever its status.
    async fn send(&self, request: RequestBuilder) -> Result<HandlerResponse, HttpTestClientError> {
        let response = request.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;

        tracing::debug!(
            target: "func.client",
            status = status.as_u16(),
            body_len = text.len(),
            "Received response"
        );

        Ok(HandlerResponse {
            status,
            headers,
            body: decode_body(&text),
        })
    }
}
