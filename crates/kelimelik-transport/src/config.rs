//! Where to connect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote host and port.
///
/// The default is the public Kelimelik game server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub const GAME_SERVER_HOST: &'static str = "141.98.204.163";
    pub const GAME_SERVER_PORT: u16 = 443;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(Self::GAME_SERVER_HOST, Self::GAME_SERVER_PORT)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_default_is_game_server() {
        let endpoint = Endpoint::default();
        assert_eq!(endpoint.to_string(), "141.98.204.163:443");
    }

    #[test]
    fn test_endpoint_display_brackets_ipv6() {
        assert_eq!(Endpoint::new("::1", 9000).to_string(), "[::1]:9000");
    }

    #[test]
    fn test_endpoint_partial_json_keeps_default_host() {
        let endpoint: Endpoint = serde_json::from_str(r#"{ "port": 8443 }"#).unwrap();
        assert_eq!(endpoint.host, Endpoint::GAME_SERVER_HOST);
        assert_eq!(endpoint.port, 8443);
    }
}
