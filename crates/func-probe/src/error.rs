//! Error types for the Functions host probe.

use std::time::Duration;
use thiserror::Error;

/// Invalid probe configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid command configuration: {0}")]
    InvalidCommand(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid output configuration: {0}")]
    InvalidOutput(String),
}

/// Errors raised while starting or stopping the Functions host.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn '{program}': {source}. Is it installed and on PATH?")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Spawned process has no {stream} pipe")]
    MissingPipe { stream: &'static str },

    #[error("Setup failed: no readiness signal within {timeout:?}")]
    SetupTimeout { timeout: Duration },

    #[error("Setup failed: process exited with {status} before reporting readiness")]
    EarlyExit { status: String },

    #[error("Setup failed: process closed stdout before reporting readiness")]
    OutputClosed,

    #[error("Failed to stop process: {0}")]
    Stop(#[source] std::io::Error),
}
