//! Packet → bytes.
//!
//! Encoding runs in two passes. The first walks the packet and computes
//! the exact frame size, rejecting unset slots before a single byte is
//! written. The second writes the frame into a buffer reserved to exactly
//! that size:
//!
//! ```text
//! size:u32 | header_len:u16 | header | slot_count:u8 | (tag:u8 payload)*
//! ```
//!
//! `size` counts everything after itself. All integers are big-endian.

use crate::error::{ArgumentReason, ProtocolError};
use crate::packet::Packet;
use crate::types::{ArrayValue, ByteString, MAX_ARRAY_ITEMS, Value, WireInt};

/// Bytes taken by the size prefix.
pub const SIZE_PREFIX_LEN: usize = 4;

/// Computes the full encoded length of `packet`, size prefix included.
///
/// # Errors
/// - `UnspecifiedType` if any slot was never set.
/// - `Argument` if an array holds more items than its count field can
///   express, or the frame would be larger than `u32::MAX` bytes.
pub fn encoded_len(packet: &Packet) -> Result<usize, ProtocolError> {
    let mut body = string_len(packet.header()) + 1;
    for (slot, value) in packet.slots().iter().enumerate() {
        body += 1 + payload_len(slot, value)?;
    }
    if body > u32::MAX as usize {
        return Err(ProtocolError::Argument {
            argument: "packet",
            reason: ArgumentReason::TooLong {
                len: body,
                max: u32::MAX as usize,
            },
        });
    }
    Ok(SIZE_PREFIX_LEN + body)
}

/// Encodes `packet` into a new buffer.
///
/// The packet is only read; encoding the same packet twice yields the same
/// bytes.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    encode_into(packet, &mut out)?;
    Ok(out)
}

/// Appends the encoding of `packet` to `out` and returns the number of
/// bytes written.
///
/// On error nothing is appended.
pub fn encode_into(packet: &Packet, out: &mut Vec<u8>) -> Result<usize, ProtocolError> {
    let total = encoded_len(packet)?;
    let start = out.len();
    out.reserve(total);

    // encoded_len already checked the body fits in a u32.
    ((total - SIZE_PREFIX_LEN) as u32).put_be(out);
    put_string(out, packet.header());
    packet.slot_count().put_be(out);

    for value in packet.slots() {
        put_value(out, value);
    }

    let written = out.len() - start;
    debug_assert_eq!(written, total, "size pass and write pass disagree");
    Ok(written)
}

// ---------------------------------------------------------------------------
// Size pass
// ---------------------------------------------------------------------------

fn string_len(s: &ByteString) -> usize {
    2 + s.len()
}

fn payload_len(slot: usize, value: &Value) -> Result<usize, ProtocolError> {
    match value {
        Value::Unspecified => Err(ProtocolError::UnspecifiedType { slot }),
        Value::UInt8(_) => Ok(u8::WIDTH),
        Value::UInt32(_) => Ok(u32::WIDTH),
        Value::UInt64(_) => Ok(u64::WIDTH),
        Value::Str(s) => Ok(string_len(s)),
        Value::Array(array) => array_len(array),
    }
}

fn array_len(array: &ArrayValue) -> Result<usize, ProtocolError> {
    if array.len() > MAX_ARRAY_ITEMS {
        return Err(ProtocolError::Argument {
            argument: "array",
            reason: ArgumentReason::TooLong {
                len: array.len(),
                max: MAX_ARRAY_ITEMS,
            },
        });
    }
    let items = match array {
        ArrayValue::Str(items) => items.iter().map(string_len).sum(),
        _ => array.element_type().fixed_width().unwrap_or(0) * array.len(),
    };
    Ok(4 + 1 + items)
}

// ---------------------------------------------------------------------------
// Write pass
// ---------------------------------------------------------------------------

fn put_string(out: &mut Vec<u8>, s: &ByteString) {
    // ByteString::new caps the length at u16::MAX.
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn put_value(out: &mut Vec<u8>, value: &Value) {
    if let Some(tag) = value.value_type().tag() {
        out.push(tag);
    }
    match value {
        Value::Unspecified => {}
        Value::UInt8(v) => v.put_be(out),
        Value::UInt32(v) => v.put_be(out),
        Value::UInt64(v) => v.put_be(out),
        Value::Str(s) => put_string(out, s),
        Value::Array(array) => put_array(out, array),
    }
}

fn put_array(out: &mut Vec<u8>, array: &ArrayValue) {
    (array.len() as u32).put_be(out);
    out.push(array.element_type().tag());
    match array {
        ArrayValue::UInt8(items) => out.extend_from_slice(items),
        ArrayValue::UInt32(items) => put_ints(out, items),
        ArrayValue::UInt64(items) => put_ints(out, items),
        ArrayValue::Str(items) => items.iter().for_each(|s| put_string(out, s)),
    }
}

fn put_ints<T: WireInt>(out: &mut Vec<u8>, items: &[T]) {
    for item in items {
        item.put_be(out);
    }
}
