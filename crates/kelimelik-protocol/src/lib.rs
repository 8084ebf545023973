//! Wire protocol for Kelimelik.
//!
//! This crate defines the binary format the game server speaks and the
//! machinery to read and write it:
//!
//! - **Values** ([`Value`], [`ArrayValue`], [`ByteString`]): what a slot
//!   can hold.
//! - **Packets** ([`Packet`]): a header string plus positional slots.
//! - **Encoding / decoding** ([`encode`], [`decode_one`], the [`Codec`]
//!   trait and [`WireCodec`]): packets to frames and back.
//! - **Stream parsing** ([`StreamParser`]): frames out of arbitrarily
//!   chunked socket reads.
//! - **Verification** ([`verify`], [`Format`]): asserting a packet's shape
//!   before trusting its contents.
//! - **Errors** ([`ProtocolError`]): what can go wrong, with enough
//!   context to find the offending field.
//!
//! # Architecture
//!
//! The protocol layer does no I/O. The transport layer reads bytes and
//! pushes them in; this crate hands back packets.
//!
//! ```text
//! Transport (bytes) → StreamParser → Packet → caller
//! caller → Packet → encode → Transport (bytes)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod config;
mod decode;
mod encode;
mod error;
mod packet;
mod parser;
mod types;
mod verify;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, WireCodec};
pub use config::ParserConfig;
pub use decode::decode_one;
pub use encode::{SIZE_PREFIX_LEN, encode, encode_into, encoded_len};
pub use error::{ArgumentReason, Field, ProtocolError, TypeError};
pub use packet::{MAX_SLOTS, Packet};
pub use parser::{ParserStats, Phase, StreamParser};
pub use types::{
    ArrayValue, ByteString, ElementType, MAX_ARRAY_ITEMS, MAX_STRING_LEN, Value, ValueType,
    WireInt,
};
pub use verify::{Expect, Format, FormatItem, verify};
