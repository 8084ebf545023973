//! Unified error type for the Kelimelik client.

use kelimelik_protocol::ProtocolError;
use kelimelik_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `kelimelik` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KelimelikError {
    /// A transport-level error (resolve, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, verify).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A global logging subscriber was already installed.
    #[error("logging already initialised: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
}
