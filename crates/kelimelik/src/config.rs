//! Client configuration.

use kelimelik_protocol::ParserConfig;
use kelimelik_transport::{DEFAULT_READ_BUFFER_LEN, Endpoint};
use serde::{Deserialize, Serialize};

use crate::KelimelikError;

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Everything needed to open a [`PacketConnection`](crate::PacketConnection).
///
/// Every field has a default, so a JSON config only lists what it changes:
///
/// ```rust
/// use kelimelik::ClientConfig;
///
/// let config = ClientConfig::from_json(r#"{ "endpoint": { "port": 8443 } }"#).unwrap();
/// assert_eq!(config.endpoint.host, "141.98.204.163");
/// assert_eq!(config.endpoint.port, 8443);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server to connect to.
    pub endpoint: Endpoint,

    /// Limits for the incoming stream parser.
    pub parser: ParserConfig,

    /// Most bytes read from the socket per receive call.
    pub read_buffer_len: usize,
}

impl ClientConfig {
    /// Parses a JSON config.
    pub fn from_json(json: &str) -> Result<Self, KelimelikError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Default settings aimed at `endpoint`.
    pub fn for_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            parser: ParserConfig::default(),
            read_buffer_len: DEFAULT_READ_BUFFER_LEN,
        }
    }
}
