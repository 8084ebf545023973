//! Transport abstraction layer for Kelimelik.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! how bytes reach the game server, plus the TCP implementation the game
//! actually uses. Nothing here knows about packets; connections move raw
//! byte chunks, and the protocol layer reassembles them.
//!
//! # Feature Flags
//!
//! - `tcp` (default): TCP transport via `tokio::net`

#![allow(async_fn_in_trait)]

mod config;
mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use config::Endpoint;
pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{DEFAULT_READ_BUFFER_LEN, TcpConnection, TcpTransport, connect};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide number of a connection, printed as `#N` in relay logs.
///
/// Numbers are handed out by [`ConnectionId::next`] in increasing order
/// and never reused, so two live connections never share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Allocates the next unused number.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting: later calls to `accept` fail.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single connection that carries a byte stream both ways.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Writes all of `data` to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next chunk of bytes from the remote peer.
    ///
    /// Chunk boundaries carry no meaning: a chunk may hold part of a frame
    /// or several frames. Returns `Ok(None)` when the peer closed the
    /// connection cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the sending side of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
