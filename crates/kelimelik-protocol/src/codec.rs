//! The codec seam between packets and bytes.
//!
//! The [`StreamParser`](crate::StreamParser) only needs *something* that
//! turns a complete frame into a [`Packet`] and back. That something is the
//! [`Codec`] trait. [`WireCodec`] is the real binary format; tests and
//! tools can plug in their own implementation (for instance one that
//! records every frame it sees) without touching the parser.

use crate::decode::decode_one;
use crate::encode::encode;
use crate::error::ProtocolError;
use crate::packet::Packet;

/// Converts packets to frames and frames to packets.
///
/// ## Trait bounds
///
/// `Send + Sync + 'static` lets a codec live inside a parser that is
/// moved into a Tokio task.
pub trait Codec: Send + Sync + 'static {
    /// Encodes one packet as a complete frame, size prefix included.
    ///
    /// # Errors
    /// Whatever the format rejects, e.g. `UnspecifiedType` for an unset
    /// slot.
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError>;

    /// Decodes exactly one complete frame, size prefix included.
    ///
    /// # Errors
    /// Truncation, unknown tags and the like. The caller decides whether
    /// the error ends the stream.
    fn decode(&self, frame: &[u8]) -> Result<Packet, ProtocolError>;
}

// ---------------------------------------------------------------------------
// WireCodec
// ---------------------------------------------------------------------------

/// The Kelimelik binary format.
///
/// ```rust
/// use kelimelik_protocol::{Codec, Packet, WireCodec};
///
/// let codec = WireCodec;
/// let mut packet = Packet::new("Ping", 1).unwrap();
/// packet.set(0, 1u32).unwrap();
///
/// let frame = codec.encode(&packet).unwrap();
/// assert_eq!(codec.decode(&frame).unwrap(), packet);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec;

impl Codec for WireCodec {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        encode(packet)
    }

    fn decode(&self, frame: &[u8]) -> Result<Packet, ProtocolError> {
        decode_one(frame)
    }
}
