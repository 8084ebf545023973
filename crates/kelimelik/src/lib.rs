//! # Kelimelik
//!
//! Client library for the Kelimelik word game protocol.
//!
//! The protocol itself (values, packets, the binary codec and the stream
//! parser) lives in `kelimelik-protocol`; sockets live in
//! `kelimelik-transport`. This crate ties the two together into a
//! [`PacketConnection`] and adds configuration, logging setup and a single
//! error type.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kelimelik::prelude::*;
//!
//! # async fn run() -> Result<(), KelimelikError> {
//! init_logging()?;
//! let mut conn = PacketConnection::connect(&ClientConfig::default()).await?;
//! while let Some(packet) = conn.next_packet().await? {
//!     println!("{}", packet.header());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod logging;

pub use config::ClientConfig;
pub use connection::PacketConnection;
pub use error::KelimelikError;
pub use logging::init_logging;

pub use kelimelik_protocol as protocol;
pub use kelimelik_transport as transport;

/// Convenient re-exports for the common case.
///
/// ```rust
/// use kelimelik::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{ClientConfig, KelimelikError, PacketConnection, init_logging};

    pub use kelimelik_protocol::{
        ArrayValue, ByteString, Format, Packet, ParserConfig, ProtocolError, StreamParser,
        Value, ValueType, decode_one, encode, verify,
    };
    pub use kelimelik_transport::{
        Connection, ConnectionId, Endpoint, TcpConnection, TcpTransport, Transport,
        TransportError,
    };
}
