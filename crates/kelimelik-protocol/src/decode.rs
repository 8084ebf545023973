//! Bytes → packet, for one complete frame.
//!
//! Every read goes through [`Reader`], which checks that the bytes a field
//! needs are present *before* touching them. A failure anywhere drops the
//! slots decoded so far and returns the error; no partial packet is ever
//! handed out.
//!
//! String arrays need a two-phase read because the size of each item is
//! only known once its length prefix has been seen. Phase A walks the
//! length prefixes with a scratch cursor and records where each string
//! lives. Phase B copies the strings out only after phase A has proven that
//! all of them fit.

use crate::encode::SIZE_PREFIX_LEN;
use crate::error::{ArgumentReason, Field, ProtocolError, TypeError};
use crate::packet::Packet;
use crate::types::{ArrayValue, ByteString, ElementType, Value, ValueType, WireInt};

/// Decodes exactly one frame, size prefix included.
///
/// # Errors
/// - `Argument` with a `Truncated` reason if `buf` ends before the frame
///   (or any field inside it) is complete. [`ProtocolError::is_truncation`]
///   identifies these.
/// - `Argument` with a `LengthMismatch` reason if `buf` holds bytes past
///   the end of the frame.
/// - `InvalidType` for an unknown tag or an array of arrays.
///
/// Bytes left inside the frame after the last slot are logged and ignored.
pub fn decode_one(buf: &[u8]) -> Result<Packet, ProtocolError> {
    let mut reader = Reader::new(buf);
    let size: u32 = reader.int(Field::SizePrefix)?;
    let frame_len = SIZE_PREFIX_LEN.saturating_add(size as usize);

    if buf.len() < frame_len {
        return Err(ProtocolError::truncated(Field::Body, frame_len, buf.len()));
    }
    if buf.len() > frame_len {
        return Err(ProtocolError::Argument {
            argument: "bytes",
            reason: ArgumentReason::LengthMismatch {
                declared: frame_len,
                actual: buf.len(),
            },
        });
    }

    decode_body(reader)
}

fn decode_body(mut reader: Reader<'_>) -> Result<Packet, ProtocolError> {
    let header = reader.string(Field::HeaderLength, Field::Header)?;
    let slot_count: u8 = reader.int(Field::SlotCount)?;

    let mut slots = Vec::with_capacity(usize::from(slot_count));
    for slot in 0..usize::from(slot_count) {
        slots.push(read_slot(&mut reader, slot)?);
    }

    if reader.remaining() > 0 {
        tracing::warn!(
            trailing = reader.remaining(),
            header = %header,
            "bytes left in frame after the last slot"
        );
    }

    Packet::from_values(header, slots)
}

fn read_slot(reader: &mut Reader<'_>, slot: usize) -> Result<Value, ProtocolError> {
    let tag_field = Field::SlotTag { slot };
    let tag: u8 = reader.int(tag_field)?;
    let field = Field::Slot { slot };

    let value = match ValueType::from_tag(tag) {
        Some(ValueType::UInt8) => Value::UInt8(reader.int(field)?),
        Some(ValueType::UInt32) => Value::UInt32(reader.int(field)?),
        Some(ValueType::UInt64) => Value::UInt64(reader.int(field)?),
        Some(ValueType::Str) => Value::Str(reader.string(field, field)?),
        Some(ValueType::Array) => Value::Array(read_array(reader, slot)?),
        Some(ValueType::Unspecified) | None => {
            return Err(TypeError::UnknownTag {
                tag,
                field: tag_field,
            }
            .into());
        }
    };
    Ok(value)
}

fn read_array(reader: &mut Reader<'_>, slot: usize) -> Result<ArrayValue, ProtocolError> {
    let field = Field::Slot { slot };
    let count = reader.int::<u32>(field)? as usize;
    let tag: u8 = reader.int(field)?;

    let element = match ValueType::from_tag(tag) {
        Some(ty) => ElementType::try_from(ty)?,
        None => return Err(TypeError::UnknownTag { tag, field }.into()),
    };

    match element {
        ElementType::UInt8 => read_ints::<u8>(reader, slot, count),
        ElementType::UInt32 => read_ints::<u32>(reader, slot, count),
        ElementType::UInt64 => read_ints::<u64>(reader, slot, count),
        ElementType::Str => read_strings(reader, slot, count),
    }
}

fn read_ints<T: WireInt>(
    reader: &mut Reader<'_>,
    slot: usize,
    count: usize,
) -> Result<ArrayValue, ProtocolError> {
    let available = reader.remaining();
    let needed = count.saturating_mul(T::WIDTH);
    if needed > available {
        let field = Field::ArrayElement {
            slot,
            index: available / T::WIDTH,
        };
        return Err(ProtocolError::truncated(field, needed, available));
    }

    let bytes = reader.take(needed, Field::Slot { slot })?;
    let items = bytes.chunks_exact(T::WIDTH).map(T::from_be_slice).collect();
    Ok(T::into_array(items))
}

fn read_strings(
    reader: &mut Reader<'_>,
    slot: usize,
    count: usize,
) -> Result<ArrayValue, ProtocolError> {
    // Every item costs at least its 2-byte length prefix. Checking this
    // first keeps a hostile count from sizing the span table below.
    let available = reader.remaining();
    if count > available / 2 {
        let field = Field::ArrayElement {
            slot,
            index: available / 2,
        };
        return Err(ProtocolError::truncated(field, count.saturating_mul(2), available));
    }

    // Phase A: locate every item without copying anything.
    let mut scan = reader.clone();
    let mut spans = Vec::with_capacity(count);
    for index in 0..count {
        let field = Field::ArrayElement { slot, index };
        let len = usize::from(scan.u16(field)?);
        let start = scan.pos;
        scan.take(len, field)?;
        spans.push((start, len));
    }

    // Phase B: every span is known to be in bounds.
    let items = spans
        .into_iter()
        .enumerate()
        .map(|(index, (start, len))| {
            let bytes = scan.buf.get(start..start + len).ok_or_else(|| {
                ProtocolError::truncated(Field::ArrayElement { slot, index }, len, 0)
            })?;
            ByteString::new(bytes)
        })
        .collect::<Result<Vec<_>, _>>()?;

    *reader = scan;
    Ok(ArrayValue::Str(items))
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A bounds-checked cursor over one frame.
#[derive(Debug, Clone)]
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consumes `n` bytes, or fails without moving if fewer remain.
    fn take(&mut self, n: usize, field: Field) -> Result<&'a [u8], ProtocolError> {
        let available = self.remaining();
        if n > available {
            return Err(ProtocolError::truncated(field, n, available));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn int<T: WireInt>(&mut self, field: Field) -> Result<T, ProtocolError> {
        self.take(T::WIDTH, field).map(T::from_be_slice)
    }

    fn u16(&mut self, field: Field) -> Result<u16, ProtocolError> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a `len:u16` prefixed string.
    fn string(&mut self, len_field: Field, field: Field) -> Result<ByteString, ProtocolError> {
        let len = usize::from(self.u16(len_field)?);
        ByteString::new(self.take(len, field)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_decode_scalars() {
        let buf = frame(&[
            0, 1, b'P', // header
            3, // slots
            1, 0xFE, // u8
            0, 0, 0, 1, 0, // u32
            3, 0, 0, 0, 0, 0, 0, 0, 9, // u64
        ]);
        let packet = decode_one(&buf).unwrap();
        assert_eq!(packet.header(), "P");
        assert_eq!(packet.u8_at(0), Some(0xFE));
        assert_eq!(packet.u32_at(1), Some(256));
        assert_eq!(packet.u64_at(2), Some(9));
    }

    #[test]
    fn test_decode_keeps_string_bytes_verbatim() {
        let buf = frame(&[0, 0, 1, 7, 0, 3, b'a', 0, 0xFF]);
        let packet = decode_one(&buf).unwrap();
        assert_eq!(packet.str_at(0).unwrap().as_bytes(), [b'a', 0, 0xFF]);
    }

    #[test]
    fn test_decode_rejects_short_size_prefix() {
        let err = decode_one(&[0, 0, 1]).unwrap_err();
        assert!(err.is_truncation());
        assert!(matches!(
            err,
            ProtocolError::Argument {
                reason: ArgumentReason::Truncated {
                    field: Field::SizePrefix,
                    needed: 4,
                    available: 3,
                },
                ..
            }
        ));
    }

    #[test]
    fn test_decode_rejects_buffer_shorter_than_declared() {
        let mut buf = frame(&[0, 0, 0]);
        buf.pop();
        let err = decode_one(&buf).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_decode_rejects_bytes_after_frame() {
        let mut buf = frame(&[0, 0, 0]);
        buf.push(0);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Argument {
                reason: ArgumentReason::LengthMismatch {
                    declared: 7,
                    actual: 8,
                },
                ..
            }
        ));
    }

    #[test]
    fn test_decode_accepts_trailing_bytes_inside_frame() {
        let buf = frame(&[0, 0, 1, 1, 5, 0xAA, 0xBB]);
        let packet = decode_one(&buf).unwrap();
        assert_eq!(packet.u8_at(0), Some(5));
    }

    #[test]
    fn test_decode_understated_size_fails_inside_slot() {
        // Size prefix covers the header and slot count but not the slot.
        let buf = frame(&[0, 0, 1, 0, 0, 0]);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Argument {
                reason: ArgumentReason::Truncated {
                    field: Field::Slot { slot: 0 },
                    needed: 4,
                    available: 2,
                },
                ..
            }
        ));
    }

    #[test]
    fn test_decode_unknown_slot_tag() {
        let buf = frame(&[0, 0, 1, 2, 0]);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidType(TypeError::UnknownTag {
                tag: 2,
                field: Field::SlotTag { slot: 0 },
            })
        ));
    }

    #[test]
    fn test_decode_unknown_element_tag() {
        let buf = frame(&[0, 0, 1, 8, 0, 0, 0, 0, 0x42]);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidType(TypeError::UnknownTag { tag: 0x42, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_array_of_arrays() {
        let buf = frame(&[0, 0, 1, 8, 0, 0, 0, 1, 8]);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidType(TypeError::NestedArray)
        ));
    }

    #[test]
    fn test_decode_int_array_too_short_names_element() {
        // Declares 3 u32s but carries 5 bytes.
        let buf = frame(&[0, 0, 1, 8, 0, 0, 0, 3, 0, 0, 0, 0, 1, 0]);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Argument {
                reason: ArgumentReason::Truncated {
                    field: Field::ArrayElement { slot: 0, index: 1 },
                    needed: 12,
                    available: 5,
                },
                ..
            }
        ));
    }

    #[test]
    fn test_decode_huge_string_count_fails_before_allocating() {
        let buf = frame(&[0, 0, 1, 8, 0xFF, 0xFF, 0xFF, 0xFF, 7, 0, 0]);
        let err = decode_one(&buf).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_decode_string_array_item_overruns() {
        // Second item claims 9 bytes, only 1 follows.
        let buf = frame(&[0, 0, 1, 8, 0, 0, 0, 2, 7, 0, 1, b'a', 0, 9, b'b']);
        let err = decode_one(&buf).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Argument {
                reason: ArgumentReason::Truncated {
                    field: Field::ArrayElement { slot: 0, index: 1 },
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_decode_empty_arrays() {
        let buf = frame(&[0, 0, 2, 8, 0, 0, 0, 0, 7, 8, 0, 0, 0, 0, 3]);
        let packet = decode_one(&buf).unwrap();
        assert_eq!(packet.array_at(0), Some(&ArrayValue::Str(vec![])));
        assert_eq!(packet.array_at(1), Some(&ArrayValue::UInt64(vec![])));
    }

    #[test]
    fn test_decode_round_trips_encoder_output() {
        let mut packet = Packet::new("GameModule_userProfile", 4).unwrap();
        packet.set(0, 7u8).unwrap();
        packet.set_str(1, "kelime").unwrap();
        packet.set(2, ArrayValue::from(vec![u32::MAX, 0])).unwrap();
        packet.set(3, ArrayValue::strings(["a", "", "ç"]).unwrap()).unwrap();

        let bytes = encode(&packet).unwrap();
        assert_eq!(decode_one(&bytes).unwrap(), packet);
    }
}
