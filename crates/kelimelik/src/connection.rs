//! Packet-level connection: a byte [`Connection`] plus a [`StreamParser`].
//!
//! The flow for incoming data is:
//!   1. Receive a chunk of bytes from the transport
//!   2. Feed it to the stream parser
//!   3. Queue whatever packets it completed, in order
//!   4. Hand them out one at a time from `next_packet`

use std::collections::VecDeque;

use kelimelik_protocol::{Packet, ParserConfig, ParserStats, StreamParser, encode};
use kelimelik_transport::{Connection, ConnectionId, TcpConnection, TransportError};

use crate::{ClientConfig, KelimelikError};

/// Sends and receives whole packets over a byte connection.
///
/// ```rust,no_run
/// use kelimelik::prelude::*;
///
/// # async fn run() -> Result<(), KelimelikError> {
/// let mut conn = PacketConnection::connect(&ClientConfig::default()).await?;
///
/// let mut hello = Packet::new("GameModule_requestLogin", 3)?;
/// hello.set(0, 1234u32)?;
/// hello.set_str(1, "secret")?;
/// hello.set(2, 238u32)?;
/// conn.send(&hello).await?;
///
/// while let Some(packet) = conn.next_packet().await? {
///     println!("{packet}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct PacketConnection<C = TcpConnection> {
    conn: C,
    parser: StreamParser,
    queue: VecDeque<Packet>,
    closed: bool,
}

impl PacketConnection<TcpConnection> {
    /// Connects to `config.endpoint` over TCP.
    pub async fn connect(config: &ClientConfig) -> Result<Self, KelimelikError> {
        let conn = kelimelik_transport::connect(&config.endpoint)
            .await?
            .with_read_buffer_len(config.read_buffer_len);
        Ok(Self::new(conn, config.parser.clone()))
    }
}

impl<C> PacketConnection<C>
where
    C: Connection<Error = TransportError>,
{
    /// Wraps an established connection.
    pub fn new(conn: C, parser: ParserConfig) -> Self {
        Self {
            conn,
            parser: StreamParser::with_config(parser),
            queue: VecDeque::new(),
            closed: false,
        }
    }

    /// Encodes `packet` and writes it as one frame.
    ///
    /// # Errors
    /// `Protocol` if the packet cannot be encoded (nothing is sent), or
    /// `Transport` if the write fails.
    pub async fn send(&self, packet: &Packet) -> Result<(), KelimelikError> {
        let frame = encode(packet)?;
        tracing::debug!(
            id = %self.conn.id(),
            header = %packet.header(),
            frame_len = frame.len(),
            "sending packet"
        );
        self.conn.send(&frame).await?;
        Ok(())
    }

    /// Waits for the next complete packet.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection and every
    /// packet received before that has been handed out. Malformed frames
    /// are skipped (the parser logs them) and never surface here.
    pub async fn next_packet(&mut self) -> Result<Option<Packet>, KelimelikError> {
        loop {
            if let Some(packet) = self.queue.pop_front() {
                return Ok(Some(packet));
            }
            if self.closed {
                return Ok(None);
            }

            match self.conn.recv().await? {
                Some(bytes) => self.queue.extend(self.parser.feed(&bytes)),
                None => {
                    if !self.parser.is_idle() {
                        tracing::warn!(
                            id = %self.conn.id(),
                            pending = self.parser.pending_len(),
                            "connection closed in the middle of a frame"
                        );
                    }
                    self.closed = true;
                }
            }
        }
    }

    /// Closes the sending side. Packets already received can still be read.
    pub async fn close(&self) -> Result<(), KelimelikError> {
        self.conn.close().await?;
        Ok(())
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Parser counters for the incoming direction.
    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Borrows the underlying byte connection.
    pub fn get_ref(&self) -> &C {
        &self.conn
    }
}
