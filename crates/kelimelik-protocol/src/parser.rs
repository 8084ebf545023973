//! Incremental frame reassembly.
//!
//! A socket hands out bytes in whatever chunks it likes: half a size
//! prefix, three frames and a bit, one byte at a time. [`StreamParser`]
//! buffers those chunks and decodes each frame as soon as its last byte
//! arrives.
//!
//! The parser is a two-state machine:
//!
//! ```text
//!        4 prefix bytes read            body complete (decode)
//! AwaitingLength ─────────────▶ AwaitingBody ─────────────▶ AwaitingLength
//! ```
//!
//! The size prefix stays at the front of the pending buffer when the body
//! starts, since decoding expects whole frames. A frame that fails to decode
//! is logged and counted; the parser carries on with the next one.

use serde::Serialize;

use crate::codec::{Codec, WireCodec};
use crate::config::ParserConfig;
use crate::encode::SIZE_PREFIX_LEN;
use crate::packet::Packet;
use crate::types::WireInt;

/// Which part of a frame the parser is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Collecting the 4-byte size prefix.
    AwaitingLength,
    /// Collecting the body announced by the prefix.
    AwaitingBody,
}

/// Running totals since the parser was created or last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    /// Frames that decoded into packets.
    pub frames_decoded: u64,
    /// Frames that failed to decode or exceeded the size limit.
    pub frames_rejected: u64,
    /// Bytes passed to [`StreamParser::feed`].
    pub bytes_consumed: u64,
}

/// Reassembles packets from an arbitrarily chunked byte stream.
///
/// One parser serves one direction of one connection. It does no I/O:
/// the caller reads from its socket however it likes and passes the bytes
/// to [`feed`](Self::feed).
///
/// ```rust
/// use kelimelik_protocol::{Packet, StreamParser, encode};
///
/// let mut packet = Packet::new("Ping", 1).unwrap();
/// packet.set(0, 7u8).unwrap();
/// let frame = encode(&packet).unwrap();
///
/// let mut parser = StreamParser::new();
/// let (first, second) = frame.split_at(3);
/// assert!(parser.feed(first).is_empty());
/// assert_eq!(parser.feed(second), vec![packet]);
/// ```
#[derive(Debug)]
pub struct StreamParser<C: Codec = WireCodec> {
    codec: C,
    config: ParserConfig,
    phase: Phase,
    /// The current frame so far, size prefix included. Stays empty while
    /// an oversized frame is being skipped.
    pending: Vec<u8>,
    /// Bytes still missing before the current phase completes.
    bytes_remaining: u32,
    /// Set while the body of an oversized frame is being skipped.
    discarding: bool,
    stats: ParserStats,
}

impl StreamParser<WireCodec> {
    /// Creates a parser for the wire format with the default limits.
    ///
    /// The default [`ParserConfig`] drops frames whose body exceeds
    /// [`ParserConfig::DEFAULT_MAX_FRAME_LEN`] (16 MiB), even though the
    /// wire format allows bodies up to `u32::MAX` bytes. Such frames are
    /// counted in [`ParserStats::frames_rejected`]. Use
    /// `StreamParser::with_config(ParserConfig::unlimited())` to accept
    /// every frame the size prefix can describe.
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self::with_codec(WireCodec, config)
    }
}

impl Default for StreamParser<WireCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> StreamParser<C> {
    /// Creates a parser that decodes complete frames with `codec`.
    pub fn with_codec(codec: C, config: ParserConfig) -> Self {
        Self {
            codec,
            config,
            phase: Phase::AwaitingLength,
            pending: Vec::with_capacity(SIZE_PREFIX_LEN),
            bytes_remaining: SIZE_PREFIX_LEN as u32,
            discarding: false,
            stats: ParserStats::default(),
        }
    }

    /// Consumes `bytes` and returns every packet completed by them, in
    /// stream order.
    ///
    /// `bytes` may be any length, including zero, and may end anywhere
    /// inside a frame; the remainder is kept for the next call.
    ///
    /// The returned packets are owned by the caller. The parser keeps no
    /// reference to them, so they stay valid across later calls.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<Packet> {
        self.stats.bytes_consumed += bytes.len() as u64;
        let mut packets = Vec::new();

        while !bytes.is_empty() {
            let take = bytes.len().min(self.bytes_remaining as usize);
            let (chunk, rest) = bytes.split_at(take);
            bytes = rest;

            if !self.discarding {
                self.pending.extend_from_slice(chunk);
            }
            // `take` is bounded by `bytes_remaining`, a u32.
            self.bytes_remaining -= take as u32;

            if self.bytes_remaining == 0 {
                if let Some(packet) = self.complete_phase() {
                    packets.push(packet);
                }
            }
        }

        packets
    }

    /// Consumes a single byte.
    pub fn feed_byte(&mut self, byte: u8) -> Vec<Packet> {
        self.feed(&[byte])
    }

    /// Drops any partial frame and zeroes the statistics.
    pub fn reset(&mut self) {
        self.start_next_frame();
        self.stats = ParserStats::default();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Bytes of the current frame buffered so far.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes still missing before the current phase completes.
    pub fn bytes_remaining(&self) -> u32 {
        self.bytes_remaining
    }

    /// Returns `true` between frames, with nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::AwaitingLength && self.pending.is_empty()
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn complete_phase(&mut self) -> Option<Packet> {
        match self.phase {
            Phase::AwaitingLength => self.begin_body(),
            Phase::AwaitingBody => self.finish_frame(),
        }
    }

    fn begin_body(&mut self) -> Option<Packet> {
        let size = u32::from_be_slice(&self.pending);

        if self.config.allows(size) {
            self.pending.reserve_exact(size as usize);
        } else {
            tracing::warn!(
                size,
                max = self.config.max_frame_len,
                "skipping frame over the size limit"
            );
            self.stats.frames_rejected += 1;
            self.pending.clear();
            self.discarding = true;
        }

        self.phase = Phase::AwaitingBody;
        self.bytes_remaining = size;

        // An empty body is complete as soon as its prefix is.
        if size == 0 {
            return self.finish_frame();
        }
        None
    }

    fn finish_frame(&mut self) -> Option<Packet> {
        let packet = if self.discarding {
            None
        } else {
            match self.codec.decode(&self.pending) {
                Ok(packet) => {
                    tracing::trace!(
                        header = %packet.header(),
                        slots = packet.slot_count(),
                        frame_len = self.pending.len(),
                        "frame decoded"
                    );
                    self.stats.frames_decoded += 1;
                    Some(packet)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        frame_len = self.pending.len(),
                        "dropping malformed frame"
                    );
                    self.stats.frames_rejected += 1;
                    None
                }
            }
        };

        self.start_next_frame();
        packet
    }

    fn start_next_frame(&mut self) {
        self.pending.clear();
        self.pending.shrink_to(self.config.retained_capacity);
        self.phase = Phase::AwaitingLength;
        self.bytes_remaining = SIZE_PREFIX_LEN as u32;
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::encode::encode;
    use crate::error::ProtocolError;
    use crate::types::ArrayValue;

    fn packet(name: &str, n: u32) -> Packet {
        let mut packet = Packet::new(name, 2).unwrap();
        packet.set(0, n).unwrap();
        packet.set(1, ArrayValue::strings(["a", "bc"]).unwrap()).unwrap();
        packet
    }

    fn stream(packets: &[Packet]) -> Vec<u8> {
        packets.iter().flat_map(|p| encode(p).unwrap()).collect()
    }

    #[test]
    fn test_new_parser_awaits_length() {
        let parser = StreamParser::new();
        assert_eq!(parser.phase(), Phase::AwaitingLength);
        assert_eq!(parser.bytes_remaining(), 4);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_feed_empty_slice_is_noop() {
        let mut parser = StreamParser::new();
        assert!(parser.feed(&[]).is_empty());
        assert!(parser.is_idle());
    }

    #[test]
    fn test_feed_whole_frame() {
        let p = packet("One", 1);
        let mut parser = StreamParser::new();
        assert_eq!(parser.feed(&encode(&p).unwrap()), vec![p]);
        assert!(parser.is_idle());
        assert_eq!(parser.stats().frames_decoded, 1);
    }

    #[test]
    fn test_feed_many_frames_in_one_call() {
        let packets = vec![packet("A", 1), packet("B", 2), packet("C", 3)];
        let mut parser = StreamParser::new();
        assert_eq!(parser.feed(&stream(&packets)), packets);
    }

    #[test]
    fn test_feed_one_byte_at_a_time() {
        let packets = vec![packet("A", 1), packet("B", 2)];
        let mut parser = StreamParser::new();
        let mut out = Vec::new();
        for byte in stream(&packets) {
            out.extend(parser.feed_byte(byte));
        }
        assert_eq!(out, packets);
    }

    #[test]
    fn test_prefix_split_across_calls_is_carried_into_body() {
        let p = packet("Split", 9);
        let bytes = encode(&p).unwrap();
        let mut parser = StreamParser::new();

        assert!(parser.feed(&bytes[..2]).is_empty());
        assert_eq!(parser.phase(), Phase::AwaitingLength);
        assert_eq!(parser.bytes_remaining(), 2);

        assert!(parser.feed(&bytes[2..6]).is_empty());
        assert_eq!(parser.phase(), Phase::AwaitingBody);
        assert_eq!(parser.pending_len(), 6);
        assert_eq!(
            parser.pending_len() + parser.bytes_remaining() as usize,
            bytes.len()
        );

        assert_eq!(parser.feed(&bytes[6..]), vec![p]);
    }

    #[test]
    fn test_frame_end_and_next_prefix_in_same_chunk() {
        let packets = vec![packet("A", 1), packet("B", 2)];
        let bytes = stream(&packets);
        let first_len = encode(&packets[0]).unwrap().len();
        let mut parser = StreamParser::new();

        // Ends two bytes into the second frame's prefix.
        let cut = first_len + 2;
        assert_eq!(parser.feed(&bytes[..cut]), packets[..1]);
        assert_eq!(parser.pending_len(), 2);
        assert_eq!(parser.feed(&bytes[cut..]), packets[1..]);
    }

    #[test]
    fn test_malformed_frame_does_not_stop_the_stream() {
        let good = packet("Good", 1);
        // A well-sized frame whose only slot has an unknown tag.
        let mut bytes = vec![0, 0, 0, 5, 0, 0, 1, 0x09, 0];
        bytes.extend(encode(&good).unwrap());

        let mut parser = StreamParser::new();
        assert_eq!(parser.feed(&bytes), vec![good]);
        let stats = parser.stats();
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.bytes_consumed, bytes.len() as u64);
    }

    #[test]
    fn test_zero_size_frame_is_rejected_immediately() {
        let good = packet("After", 2);
        let mut bytes = vec![0, 0, 0, 0];
        bytes.extend(encode(&good).unwrap());

        let mut parser = StreamParser::new();
        assert!(parser.feed(&bytes[..4]).is_empty());
        assert!(parser.is_idle());
        assert_eq!(parser.stats().frames_rejected, 1);
        assert_eq!(parser.feed(&bytes[4..]), vec![good]);
    }

    #[test]
    fn test_oversized_frame_is_skipped_without_buffering() {
        let config = ParserConfig {
            max_frame_len: 8,
            ..ParserConfig::default()
        };
        let mut parser = StreamParser::with_config(config);
        let good = Packet::new("ok", 0).unwrap();

        let mut bytes = vec![0, 0, 0, 20];
        bytes.extend([0xEE; 20]);
        bytes.extend(encode(&good).unwrap());

        assert!(parser.feed(&bytes[..14]).is_empty());
        assert_eq!(parser.phase(), Phase::AwaitingBody);
        assert_eq!(parser.pending_len(), 0);
        assert_eq!(parser.bytes_remaining(), 10);

        assert_eq!(parser.feed(&bytes[14..]), vec![good]);
        assert_eq!(parser.stats().frames_rejected, 1);
    }

    #[test]
    fn test_large_valid_frame_needs_unlimited_config() {
        let limit = ParserConfig::DEFAULT_MAX_FRAME_LEN as usize;
        let mut big = Packet::new("", 1).unwrap();
        big.set(0, ArrayValue::from(vec![0u8; limit])).unwrap();
        let bytes = encode(&big).unwrap();
        assert!(bytes.len() - SIZE_PREFIX_LEN > limit);

        let mut default = StreamParser::new();
        assert!(default.feed(&bytes).is_empty());
        assert_eq!(default.stats().frames_rejected, 1);
        assert!(default.is_idle());

        let mut unlimited = StreamParser::with_config(ParserConfig::unlimited());
        assert_eq!(unlimited.feed(&bytes), vec![big]);
    }

    #[test]
    fn test_reset_drops_partial_frame_and_stats() {
        let bytes = encode(&packet("Lost", 1)).unwrap();
        let mut parser = StreamParser::new();
        parser.feed(&bytes[..bytes.len() - 1]);
        assert!(!parser.is_idle());

        parser.reset();
        assert!(parser.is_idle());
        assert_eq!(parser.stats(), ParserStats::default());

        let p = packet("Fresh", 2);
        assert_eq!(parser.feed(&encode(&p).unwrap()), vec![p]);
    }

    #[test]
    fn test_returned_packets_outlive_later_feeds() {
        let mut parser = StreamParser::new();
        let first = parser.feed(&encode(&packet("A", 1)).unwrap());
        let second = parser.feed(&encode(&packet("B", 2)).unwrap());
        assert_eq!(first[0].header(), "A");
        assert_eq!(second[0].header(), "B");
    }

    /// Records the length of every frame handed to it.
    #[derive(Default)]
    struct RecordingCodec {
        seen: Mutex<Vec<usize>>,
    }

    impl Codec for RecordingCodec {
        fn encode(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
            WireCodec.encode(packet)
        }

        fn decode(&self, frame: &[u8]) -> Result<Packet, ProtocolError> {
            self.seen.lock().unwrap().push(frame.len());
            WireCodec.decode(frame)
        }
    }

    #[test]
    fn test_codec_receives_whole_frames_with_prefix() {
        let packets = vec![packet("A", 1), packet("Longer", 2)];
        let expected: Vec<usize> = packets.iter().map(|p| encode(p).unwrap().len()).collect();

        let mut parser = StreamParser::with_codec(RecordingCodec::default(), ParserConfig::default());
        for chunk in stream(&packets).chunks(5) {
            parser.feed(chunk);
        }
        assert_eq!(*parser.codec().seen.lock().unwrap(), expected);
    }
}
