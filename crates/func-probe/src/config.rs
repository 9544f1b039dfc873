//! Probe configuration.
//!
//! Configuration is loaded from environment variables, with defaults that
//! launch the Azure Functions Core Tools host (`func start`).

use crate::error::ConfigError;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default host executable.
pub const DEFAULT_COMMAND: &str = "func";

/// Default host arguments.
pub const DEFAULT_ARGS: &[&str] = &["start"];

/// Default bound on waiting for the readiness marker, in seconds.
pub const DEFAULT_READY_TIMEOUT_SECONDS: u64 = 60;

/// Default bound on waiting for a graceful exit, in seconds.
pub const DEFAULT_STOP_TIMEOUT_SECONDS: u64 = 10;

/// Configuration for launching and supervising the host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Executable to launch.
    pub program: String,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Working directory (inherits the current one when unset).
    pub working_dir: Option<PathBuf>,

    /// How long to wait for the readiness marker.
    pub ready_timeout: Duration,

    /// How long to wait for the process to exit after SIGTERM before killing it.
    pub stop_timeout: Duration,

    /// Whether host stdout is echoed to the `func.output` log target.
    pub echo_output: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_COMMAND.to_string(),
            args: DEFAULT_ARGS.iter().map(|a| (*a).to_string()).collect(),
            working_dir: None,
            ready_timeout: Duration::from_secs(DEFAULT_READY_TIMEOUT_SECONDS),
            stop_timeout: Duration::from_secs(DEFAULT_STOP_TIMEOUT_SECONDS),
            echo_output: true,
        }
    }
}

impl ProbeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let program = vars
            .get("FUNC_COMMAND")
            .cloned()
            .unwrap_or_else(|| DEFAULT_COMMAND.to_string());

        if program.trim().is_empty() {
            return Err(ConfigError::InvalidCommand(
                "FUNC_COMMAND must not be empty".to_string(),
            ));
        }

        let args = match vars.get("FUNC_ARGS") {
            Some(value) => value.split_whitespace().map(str::to_string).collect(),
            None => DEFAULT_ARGS.iter().map(|a| (*a).to_string()).collect(),
        };

        let working_dir = vars
            .get("FUNC_WORKING_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let ready_timeout = parse_seconds(
            vars,
            "FUNC_READY_TIMEOUT_SECONDS",
            DEFAULT_READY_TIMEOUT_SECONDS,
        )?;

        let stop_timeout = parse_seconds(
            vars,
            "FUNC_STOP_TIMEOUT_SECONDS",
            DEFAULT_STOP_TIMEOUT_SECONDS,
        )?;

        let echo_output = match vars.get("FUNC_ECHO_OUTPUT").map(|v| v.to_ascii_lowercase()) {
            None => true,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            Some(v) => {
                return Err(ConfigError::InvalidOutput(format!(
                    "FUNC_ECHO_OUTPUT must be a boolean, got '{}'",
                    v
                )))
            }
        };

        Ok(Self {
            program,
            args,
            working_dir,
            ready_timeout,
            stop_timeout,
            echo_output,
        })
    }

    /// Build a configuration for an explicit command line with default timeouts.
    pub fn for_command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Override the readiness timeout.
    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Override the graceful stop timeout.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Command line as a single string, for log messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parse a positive number of seconds, falling back to `default` when unset.
fn parse_seconds(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(key) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be greater than 0",
            key
        )));
    }

    Ok(Duration::from_secs(value))
}
