//! Connection configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A remote `host:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    /// Target host (hostname or IP address).
    pub host: String,

    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint from parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidEndpoint(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Behaviour of a connection handle once open.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Appended to every line sent with `send_line`.
    pub line_ending: String,

    /// Search depth for pattern matching. Zero searches the whole buffer.
    pub search_depth: usize,

    /// Strip and refuse telnet option negotiation.
    pub telnet: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            line_ending: "\r\n".to_string(),
            search_depth: 65536,
            telnet: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        let endpoint: Endpoint = "horizons.jpl.nasa.gov:6775".parse().unwrap();
        assert_eq!(endpoint.host, "horizons.jpl.nasa.gov");
        assert_eq!(endpoint.port, 6775);
        assert_eq!(endpoint.to_string(), "horizons.jpl.nasa.gov:6775");
    }

    #[test]
    fn test_parse_ipv6_endpoint() {
        let endpoint: Endpoint = "[::1]:21".parse().unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.to_string(), "[::1]:21");
    }

    #[test]
    fn test_reject_malformed_endpoints() {
        assert!("no-port".parse::<Endpoint>().is_err());
        assert!(":21".parse::<Endpoint>().is_err());
        assert!("host:99999".parse::<Endpoint>().is_err());
    }
}
