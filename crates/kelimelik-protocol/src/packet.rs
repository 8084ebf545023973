//! The packet container: a header string plus a fixed number of slots.

use std::fmt;

use serde::Serialize;

use crate::error::{ArgumentReason, ProtocolError};
use crate::types::{ArrayValue, ByteString, Value, WireInt};

/// Most slots a packet can carry (the count travels as a `u8`).
pub const MAX_SLOTS: usize = u8::MAX as usize;

/// One protocol message.
///
/// The header names the message (`"GameModule_requestLogin"`, ...) and the
/// slots carry its positional arguments. The slot count is fixed when the
/// packet is created; every slot starts out [`Value::Unspecified`] and must
/// be set before the packet can be encoded.
///
/// ```rust
/// use kelimelik_protocol::{Packet, encode};
///
/// let mut packet = Packet::new("GameModule_requestLogin", 3).unwrap();
/// packet.set(0, 1234u32).unwrap();
/// packet.set_str(1, "hunter2").unwrap();
/// packet.set(2, 238u32).unwrap();
///
/// let bytes = encode(&packet).unwrap();
/// assert_eq!(&bytes[6..29], b"GameModule_requestLogin");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Packet {
    header: ByteString,
    slots: Vec<Value>,
}

impl Packet {
    /// Creates a packet with `slot_count` unset slots.
    ///
    /// # Errors
    /// `Argument` if the header is longer than 65535 bytes.
    pub fn new(header: impl AsRef<[u8]>, slot_count: u8) -> Result<Self, ProtocolError> {
        let header = ByteString::new(header.as_ref())?;
        Ok(Self::with_header(header, slot_count))
    }

    /// Creates a packet from an already validated header.
    pub fn with_header(header: ByteString, slot_count: u8) -> Self {
        Self {
            header,
            slots: vec![Value::Unspecified; usize::from(slot_count)],
        }
    }

    /// Creates a packet whose slots are `values`, in order.
    ///
    /// # Errors
    /// `Argument` if there are more than [`MAX_SLOTS`] values.
    pub fn from_values(header: ByteString, values: Vec<Value>) -> Result<Self, ProtocolError> {
        if values.len() > MAX_SLOTS {
            return Err(ProtocolError::Argument {
                argument: "values",
                reason: ArgumentReason::TooLong {
                    len: values.len(),
                    max: MAX_SLOTS,
                },
            });
        }
        Ok(Self {
            header,
            slots: values,
        })
    }

    pub fn header(&self) -> &ByteString {
        &self.header
    }

    /// Returns `true` if the header equals `name`.
    pub fn is(&self, name: &str) -> bool {
        self.header == name
    }

    pub fn slot_count(&self) -> u8 {
        // `slots.len()` never exceeds MAX_SLOTS, see the constructors.
        self.slots.len() as u8
    }

    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index)
    }

    /// Stores `value` in slot `index`, replacing whatever was there.
    ///
    /// Works for `u8`, `u32`, `u64`, [`ByteString`] and [`ArrayValue`]; the
    /// integer's Rust type picks its wire width.
    ///
    /// # Errors
    /// `Argument` if `index` is past the last slot.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<(), ProtocolError> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or(ProtocolError::Argument {
            argument: "index",
            reason: ArgumentReason::IndexOutOfRange { index, len },
        })?;
        *slot = value.into();
        Ok(())
    }

    /// Stores a string in slot `index`.
    ///
    /// # Errors
    /// `Argument` if `index` is out of range or the string is too long.
    pub fn set_str(&mut self, index: usize, s: impl AsRef<[u8]>) -> Result<(), ProtocolError> {
        let s = ByteString::new(s.as_ref())?;
        self.set(index, s)
    }

    /// Reads slot `index` as an integer of width `T`.
    ///
    /// Returns `None` if the slot does not exist or holds something else.
    pub fn int_at<T: WireInt>(&self, index: usize) -> Option<T> {
        self.get(index).and_then(T::from_value)
    }

    pub fn u8_at(&self, index: usize) -> Option<u8> {
        self.int_at(index)
    }

    pub fn u32_at(&self, index: usize) -> Option<u32> {
        self.int_at(index)
    }

    pub fn u64_at(&self, index: usize) -> Option<u64> {
        self.int_at(index)
    }

    pub fn str_at(&self, index: usize) -> Option<&ByteString> {
        match self.get(index)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn array_at(&self, index: usize) -> Option<&ArrayValue> {
        match self.get(index)? {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Index of the first slot that was never set.
    pub fn first_unspecified(&self) -> Option<usize> {
        self.slots.iter().position(|v| !v.is_specified())
    }

    pub fn into_parts(self) -> (ByteString, Vec<Value>) {
        (self.header, self.slots)
    }

    /// Renders the packet as indented JSON, for logs and packet dumps.
    #[cfg(feature = "json")]
    pub fn to_json_pretty(&self) -> Result<String, ProtocolError> {
        serde_json::to_string_pretty(self).map_err(ProtocolError::Json)
    }
}

/// The human-readable description: the header, then one line per slot
/// followed by the slot's wire tag in parentheses (the element tag for
/// arrays).
///
/// ```text
/// {
///   "header" = "TestPacket",
///   "data" = [
///     [
///       "Hello",
///       "World",
///     ] (7),
///     72623859790382856 (3),
///   ]
/// }
/// ```
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "  \"header\" = \"{}\",", self.header)?;
        writeln!(f, "  \"data\" = [")?;
        for value in &self.slots {
            write!(f, "    ")?;
            match value {
                Value::Array(array) if array.is_empty() => write!(f, "[]")?,
                Value::Array(array) => {
                    writeln!(f, "[")?;
                    write_items(f, array)?;
                    write!(f, "    ]")?;
                }
                Value::Str(s) => write!(f, "\"{s}\"")?,
                other => write!(f, "{other}")?,
            }
            match slot_tag(value) {
                Some(tag) => writeln!(f, " ({tag}),")?,
                None => writeln!(f, " (?),")?,
            }
        }
        write!(f, "  ]\n}}")
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, array: &ArrayValue) -> fmt::Result {
    match array {
        ArrayValue::UInt8(items) => items.iter().try_for_each(|v| writeln!(f, "      {v},")),
        ArrayValue::UInt32(items) => items.iter().try_for_each(|v| writeln!(f, "      {v},")),
        ArrayValue::UInt64(items) => items.iter().try_for_each(|v| writeln!(f, "      {v},")),
        ArrayValue::Str(items) => items.iter().try_for_each(|v| writeln!(f, "      \"{v}\",")),
    }
}

fn slot_tag(value: &Value) -> Option<u8> {
    match value {
        Value::Array(array) => Some(array.element_type().tag()),
        other => other.value_type().tag(),
    }
}
