//! Shape checks for decoded packets.
//!
//! A format descriptor is a string with one letter per slot:
//!
//! | Letter | Slot holds                         |
//! |--------|------------------------------------|
//! | `b`    | `u8`                               |
//! | `d`    | `u32`                              |
//! | `q`    | `u64`                              |
//! | `i`    | an integer of any width            |
//! | `s`    | a string                           |
//!
//! An uppercase letter means "array of". `"SQq"` therefore describes a
//! packet whose slots are an array of strings, an array of `u64` and a
//! `u64`, in that order.
//!
//! ```rust
//! use kelimelik_protocol::{ArrayValue, Packet, verify};
//!
//! let mut packet = Packet::new("GameModule_userProfile", 2).unwrap();
//! packet.set(0, 3u8).unwrap();
//! packet.set(1, ArrayValue::strings(["a"]).unwrap()).unwrap();
//!
//! assert!(verify(&packet, "iS").is_ok());
//! assert!(verify(&packet, "bs").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::packet::Packet;
use crate::types::{Value, ValueType};

/// What one format letter accepts, ignoring case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    UInt8,
    UInt32,
    UInt64,
    AnyInt,
    Str,
}

impl Expect {
    fn accepts(self, ty: ValueType) -> bool {
        match self {
            Self::UInt8 => ty == ValueType::UInt8,
            Self::UInt32 => ty == ValueType::UInt32,
            Self::UInt64 => ty == ValueType::UInt64,
            Self::AnyInt => ty.is_integer(),
            Self::Str => ty == ValueType::Str,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::UInt8 => 'b',
            Self::UInt32 => 'd',
            Self::UInt64 => 'q',
            Self::AnyInt => 'i',
            Self::Str => 's',
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::UInt8 => "u8",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::AnyInt => "integer",
            Self::Str => "string",
        }
    }
}

/// One letter of a format descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatItem {
    pub expect: Expect,
    pub array: bool,
}

impl FormatItem {
    /// Returns `true` if `value` has the shape this item describes.
    pub fn matches(&self, value: &Value) -> bool {
        match (self.array, value) {
            (true, Value::Array(array)) => self.expect.accepts(array.element_type().value_type()),
            (true, _) => false,
            (false, value) => self.expect.accepts(value.value_type()),
        }
    }
}

impl fmt::Display for FormatItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "array of {}", self.expect.name())
        } else {
            f.write_str(self.expect.name())
        }
    }
}

/// A parsed format descriptor, reusable across many packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    items: Vec<FormatItem>,
}

impl Format {
    /// Parses a descriptor such as `"SQq"`.
    ///
    /// # Errors
    /// - `NotImplemented` for `w`/`W` (the protocol has no 16-bit slot).
    /// - `InvalidFormat` for any other unknown character.
    pub fn parse(descriptor: &str) -> Result<Self, ProtocolError> {
        let items = descriptor
            .chars()
            .enumerate()
            .map(|(position, c)| parse_letter(position, c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    pub fn items(&self) -> &[FormatItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Checks `packet` against this format.
    ///
    /// # Errors
    /// `SchemaMismatch` naming the first slot that disagrees. If every
    /// shared position agrees but the lengths differ, the slot named is the
    /// length of the shorter of the two.
    pub fn verify(&self, packet: &Packet) -> Result<(), ProtocolError> {
        let slots = packet.slots();
        for (slot, (item, value)) in self.items.iter().zip(slots).enumerate() {
            check_slot(slot, item, value)?;
        }

        if self.items.len() != slots.len() {
            let slot = self.items.len().min(slots.len());
            let expected = self
                .items
                .get(slot)
                .map_or_else(|| END_OF_FORMAT.to_owned(), FormatItem::to_string);
            let found = slots
                .get(slot)
                .map_or_else(|| END_OF_PACKET.to_owned(), describe);
            return Err(ProtocolError::SchemaMismatch {
                slot,
                expected,
                found,
            });
        }
        Ok(())
    }
}

impl FromStr for Format {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            let letter = item.expect.letter();
            if item.array {
                write!(f, "{}", letter.to_ascii_uppercase())?;
            } else {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

/// Checks `packet` against `descriptor` one slot at a time.
///
/// Only the letters that line up with a slot are parsed: a descriptor
/// longer than the packet is a `SchemaMismatch` at the first extra letter,
/// whatever that letter is.
///
/// Use [`Format::parse`] once and [`Format::verify`] repeatedly when the same
/// shape is checked for many packets.
pub fn verify(packet: &Packet, descriptor: &str) -> Result<(), ProtocolError> {
    let slots = packet.slots();
    let mut letters = descriptor.chars();

    for (slot, value) in slots.iter().enumerate() {
        let Some(letter) = letters.next() else {
            return Err(ProtocolError::SchemaMismatch {
                slot,
                expected: END_OF_FORMAT.to_owned(),
                found: describe(value),
            });
        };
        check_slot(slot, &parse_letter(slot, letter)?, value)?;
    }

    match letters.next() {
        None => Ok(()),
        Some(extra) => Err(ProtocolError::SchemaMismatch {
            slot: slots.len(),
            expected: parse_letter(slots.len(), extra)
                .map_or_else(|_| format!("{extra:?}"), |item| item.to_string()),
            found: END_OF_PACKET.to_owned(),
        }),
    }
}

const END_OF_FORMAT: &str = "end of format";
const END_OF_PACKET: &str = "end of packet";

fn check_slot(slot: usize, item: &FormatItem, value: &Value) -> Result<(), ProtocolError> {
    if item.matches(value) {
        return Ok(());
    }
    Err(ProtocolError::SchemaMismatch {
        slot,
        expected: item.to_string(),
        found: describe(value),
    })
}

fn parse_letter(position: usize, c: char) -> Result<FormatItem, ProtocolError> {
    let expect = match c.to_ascii_lowercase() {
        'b' => Expect::UInt8,
        'd' => Expect::UInt32,
        'q' => Expect::UInt64,
        'i' => Expect::AnyInt,
        's' => Expect::Str,
        // 16-bit slot; no such wire type exists.
        'w' => return Err(ProtocolError::NotImplemented("16-bit slots (format letter `w`)")),
        _ => return Err(ProtocolError::InvalidFormat { position, found: c }),
    };
    Ok(FormatItem {
        expect,
        array: c.is_ascii_uppercase(),
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Array(array) => format!("array of {}", array.element_type()),
        other => other.value_type().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArrayValue;

    fn sample() -> Packet {
        let mut packet = Packet::new("Sample", 3).unwrap();
        packet.set(0, ArrayValue::strings(["x"]).unwrap()).unwrap();
        packet.set(1, ArrayValue::from(vec![1u64])).unwrap();
        packet.set(2, 5u64).unwrap();
        packet
    }

    #[test]
    fn test_parse_lower_and_upper_case() {
        let format = Format::parse("bDqIs").unwrap();
        let arrays: Vec<bool> = format.items().iter().map(|i| i.array).collect();
        assert_eq!(arrays, [false, true, false, true, false]);
        assert_eq!(format.to_string(), "bDqIs");
    }

    #[test]
    fn test_parse_rejects_unknown_letter() {
        let err = Format::parse("bx").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidFormat {
                position: 1,
                found: 'x'
            }
        ));
    }

    #[test]
    fn test_parse_rejects_non_letters() {
        assert!(matches!(
            Format::parse("1").unwrap_err(),
            ProtocolError::InvalidFormat { position: 0, .. }
        ));
    }

    #[test]
    fn test_parse_w_is_not_implemented() {
        assert!(matches!(
            Format::parse("W").unwrap_err(),
            ProtocolError::NotImplemented(_)
        ));
    }

    #[test]
    fn test_verify_accepts_matching_shape() {
        verify(&sample(), "SQq").unwrap();
        verify(&sample(), "SIi").unwrap();
    }

    #[test]
    fn test_verify_reports_first_mismatch() {
        let err = verify(&sample(), "SDs").unwrap_err();
        match err {
            ProtocolError::SchemaMismatch {
                slot,
                expected,
                found,
            } => {
                assert_eq!(slot, 1);
                assert_eq!(expected, "array of u32");
                assert_eq!(found, "array of u64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_verify_scalar_letter_rejects_array() {
        assert!(verify(&sample(), "sQq").is_err());
    }

    #[test]
    fn test_verify_format_too_short() {
        let err = verify(&sample(), "SQ").unwrap_err();
        assert!(matches!(err, ProtocolError::SchemaMismatch { slot: 2, .. }));
    }

    #[test]
    fn test_verify_format_too_long() {
        let err = verify(&sample(), "SQqb").unwrap_err();
        match err {
            ProtocolError::SchemaMismatch { slot, found, .. } => {
                assert_eq!(slot, 3);
                assert_eq!(found, "end of packet");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_verify_ignores_letters_past_the_last_slot() {
        let mut packet = Packet::new("P", 1).unwrap();
        packet.set(0, 1u8).unwrap();

        for descriptor in ["bX", "bw", "b1"] {
            let err = verify(&packet, descriptor).unwrap_err();
            match err {
                ProtocolError::SchemaMismatch { slot, found, .. } => {
                    assert_eq!(slot, 1, "{descriptor}");
                    assert_eq!(found, "end of packet", "{descriptor}");
                }
                other => panic!("{descriptor}: unexpected error: {other}"),
            }
        }
        assert!(Format::parse("bX").is_err());
    }

    #[test]
    fn test_verify_rejects_bad_letter_inside_packet() {
        let err = verify(&sample(), "SXq").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidFormat {
                position: 1,
                found: 'X'
            }
        ));
    }

    #[test]
    fn test_verify_and_parsed_format_agree_on_valid_descriptors() {
        for descriptor in ["SQq", "SIi", "SQ", "SQqb", "sQq", "SDs", ""] {
            let one_shot = verify(&sample(), descriptor).map_err(|e| e.to_string());
            let parsed = Format::parse(descriptor)
                .unwrap()
                .verify(&sample())
                .map_err(|e| e.to_string());
            assert_eq!(one_shot, parsed, "{descriptor}");
        }
    }

    #[test]
    fn test_any_int_rejects_strings() {
        let mut packet = Packet::new("P", 1).unwrap();
        packet.set_str(0, "7").unwrap();
        assert!(verify(&packet, "i").is_err());
    }

    #[test]
    fn test_unset_slot_never_matches() {
        let packet = Packet::new("P", 1).unwrap();
        assert!(verify(&packet, "i").is_err());
    }

    #[test]
    fn test_parsed_format_is_reusable() {
        let format: Format = "SQq".parse().unwrap();
        for _ in 0..3 {
            format.verify(&sample()).unwrap();
        }
    }
}
