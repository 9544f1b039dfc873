//! Readiness marker parsing.
//!
//! The Functions host announces its address with a line such as
//! `Now listening on: http://0.0.0.0:7071`. This module extracts that address
//! and turns it into an [`Endpoint`] the tests can connect to.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Literal prefix of the readiness marker.
pub const READINESS_PREFIX: &str = "Now listening on: ";

/// Readiness marker: the prefix followed by one non-whitespace token.
#[allow(clippy::expect_used)] // constant pattern
static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Now listening on: (\S+)").expect("readiness pattern is valid")
});

/// ANSI colour/cursor escape sequences emitted by the host's console logger.
#[allow(clippy::expect_used)] // constant pattern
static ANSI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ansi pattern is valid")
});

/// Hosts that mean "all interfaces" and cannot be dialled directly.
const WILDCARD_HOSTS: &[&str] = &["0.0.0.0", "[::]", "*", "+"];

/// Loopback host substituted for wildcard listen addresses.
const LOOPBACK_HOST: &str = "127.0.0.1";

/// Base URL the host is listening on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Build an endpoint from an announced address.
    ///
    /// Trailing slashes are dropped and wildcard hosts are replaced by the
    /// loopback address.
    pub fn from_announced(address: &str) -> Self {
        Self(normalize(address))
    }

    /// Base URL without a trailing slash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remove ANSI escape sequences from a line of console output.
pub fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    ANSI_PATTERN.replace_all(line, "")
}

/// Extract the announced endpoint from a line of output, if it carries the marker.
pub fn parse_marker(line: &str) -> Option<Endpoint> {
    let clean = strip_ansi(line);
    MARKER_PATTERN
        .captures(&clean)
        .and_then(|captures| captures.get(1))
        .map(|address| Endpoint::from_announced(address.as_str()))
}

fn normalize(address: &str) -> String {
    let trimmed = address.trim_end_matches('/');

    let Some((scheme, rest)) = trimmed.split_once("://") else {
        return trimmed.to_string();
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let (host, port) = split_host_port(authority);
    let host = if WILDCARD_HOSTS.contains(&host) {
        LOOPBACK_HOST
    } else {
        host
    };

    format!("{}://{}{}{}", scheme, host, port, path)
}

/// Split `host:port` into `("host", ":port")`, keeping bracketed IPv6 hosts intact.
fn split_host_port(authority: &str) -> (&str, &str) {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => authority.split_at(end + 1),
            None => (authority, ""),
        };
    }

    match authority.rfind(':') {
        Some(idx) => authority.split_at(idx),
        None => (authority, ""),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_extracts_address() {
        let endpoint = parse_marker("Now listening on: http://127.0.0.1:7071").unwrap();
        assert_eq!(endpoint.as_str(), "http://127.0.0.1:7071");
    }

    #[test]
    fn test_marker_inside_log_line() {
        let line = "[2024-05-01T10:00:00.000Z] info: Now listening on: http://localhost:7071 (pid 42)";
        let endpoint = parse_marker(line).unwrap();
        assert_eq!(endpoint.as_str(), "http://localhost:7071");
    }

    #[test]
    fn test_line_without_marker() {
        assert!(parse_marker("Azure Functions Core Tools").is_none());
        assert!(parse_marker("Now listening on:").is_none());
        assert!(parse_marker("Now listening on:    ").is_none());
    }

    #[test]
    fn test_marker_with_ansi_colours() {
        let line = "\x1b[32mNow listening on: http://0.0.0.0:7071\x1b[0m";
        let endpoint = parse_marker(line).unwrap();
        assert_eq!(endpoint.as_str(), "http://127.0.0.1:7071");
    }

    #[test]
    fn test_wildcard_hosts_become_loopback() {
        for announced in [
            "http://0.0.0.0:7071",
            "http://[::]:7071",
            "http://*:7071",
            "http://+:7071",
        ] {
            assert_eq!(
                Endpoint::from_announced(announced).as_str(),
                "http://127.0.0.1:7071",
                "announced {}",
                announced
            );
        }
    }

    #[test]
    fn test_specific_hosts_are_kept() {
        assert_eq!(
            Endpoint::from_announced("https://[::1]:7071/").as_str(),
            "https://[::1]:7071"
        );
        assert_eq!(
            Endpoint::from_announced("http://func.local").as_str(),
            "http://func.local"
        );
    }

    #[test]
    fn test_address_without_scheme_passes_through() {
        assert_eq!(Endpoint::from_announced("localhost:7071/").as_str(), "localhost:7071");
    }

    #[test]
    fn test_url_joins_with_single_slash() {
        let endpoint = Endpoint::from_announced("http://localhost:7071/");
        assert_eq!(
            endpoint.url("/api/HttpTest/ping"),
            "http://localhost:7071/api/HttpTest/ping"
        );
        assert_eq!(
            endpoint.url("api/HttpTest/ping"),
            "http://localhost:7071/api/HttpTest/ping"
        );
        assert_eq!(endpoint.to_string(), "http://localhost:7071");
    }
}
