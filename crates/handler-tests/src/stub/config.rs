//! Stub host configuration, loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default bind address: loopback, OS-assigned port.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:0";

#[derive(Debug, Error)]
pub enum StubConfigError {
    #[error("Invalid STUB_BIND_ADDRESS '{value}': {reason}")]
    InvalidBindAddress { value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubConfig {
    /// Address the stub listens on.
    pub bind_address: SocketAddr,
}

impl StubConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, StubConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, StubConfigError> {
        let value = vars
            .get("STUB_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let bind_address =
            value
                .parse()
                .map_err(|e: std::net::AddrParseError| StubConfigError::InvalidBindAddress {
                    value: value.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Self { bind_address })
    }
}
