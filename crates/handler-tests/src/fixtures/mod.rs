//! Test fixtures for interacting with the Functions host.

pub mod http_test_client;

pub use http_test_client::{HandlerResponse, HttpTestClient};
