//! The typed value model: everything a packet slot can hold.
//!
//! A slot holds exactly one [`Value`]. Values are a closed set of wire
//! types, each identified on the wire by a one-byte tag:
//!
//! | Type        | Tag | Payload                                   |
//! |-------------|-----|-------------------------------------------|
//! | `UInt32`    | 0   | 4 bytes, big-endian                       |
//! | `UInt8`     | 1   | 1 byte                                    |
//! | `UInt64`    | 3   | 8 bytes, big-endian                       |
//! | `Str`       | 7   | `len:u16` then `len` raw bytes            |
//! | `Array`     | 8   | `count:u32`, `elem_tag:u8`, then elements |
//!
//! The tags are fixed by the game server and must never change.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ArgumentReason, ProtocolError, TypeError};

/// Longest string the protocol can carry (its length travels as a `u16`).
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Most items an array can carry (its count travels as a `u32`).
pub const MAX_ARRAY_ITEMS: usize = u32::MAX as usize;

// ---------------------------------------------------------------------------
// ValueType
// ---------------------------------------------------------------------------

/// The type of a [`Value`], independent of its contents.
///
/// `Unspecified` is the type of a freshly created slot. It has no wire tag
/// and can never be encoded or decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Unspecified,
    UInt32,
    UInt8,
    UInt64,
    Str,
    Array,
}

impl ValueType {
    /// The tag byte that identifies this type on the wire.
    pub const fn tag(self) -> Option<u8> {
        match self {
            Self::Unspecified => None,
            Self::UInt32 => Some(0),
            Self::UInt8 => Some(1),
            Self::UInt64 => Some(3),
            Self::Str => Some(7),
            Self::Array => Some(8),
        }
    }

    /// Looks up the type a wire tag names.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::UInt32),
            1 => Some(Self::UInt8),
            3 => Some(Self::UInt64),
            7 => Some(Self::Str),
            8 => Some(Self::Array),
            _ => None,
        }
    }

    /// Returns `true` for the three fixed-width integer types.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt32 | Self::UInt64)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unspecified => "unspecified",
            Self::UInt32 => "u32",
            Self::UInt8 => "u8",
            Self::UInt64 => "u64",
            Self::Str => "string",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// The type shared by all items of an [`ArrayValue`].
///
/// This is [`ValueType`] minus `Array` and `Unspecified`: nested arrays are
/// not part of the protocol, so they cannot even be named here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    UInt8,
    UInt32,
    UInt64,
    Str,
}

impl ElementType {
    /// The matching [`ValueType`].
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::UInt8 => ValueType::UInt8,
            Self::UInt32 => ValueType::UInt32,
            Self::UInt64 => ValueType::UInt64,
            Self::Str => ValueType::Str,
        }
    }

    /// The wire tag written after an array's item count.
    pub const fn tag(self) -> u8 {
        match self {
            Self::UInt8 => 1,
            Self::UInt32 => 0,
            Self::UInt64 => 3,
            Self::Str => 7,
        }
    }

    /// Encoded size of one element, or `None` for strings (whose size
    /// depends on their contents).
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::UInt8 => Some(1),
            Self::UInt32 => Some(4),
            Self::UInt64 => Some(8),
            Self::Str => None,
        }
    }
}

impl TryFrom<ValueType> for ElementType {
    type Error = TypeError;

    fn try_from(value_type: ValueType) -> Result<Self, Self::Error> {
        match value_type {
            ValueType::UInt8 => Ok(Self::UInt8),
            ValueType::UInt32 => Ok(Self::UInt32),
            ValueType::UInt64 => Ok(Self::UInt64),
            ValueType::Str => Ok(Self::Str),
            ValueType::Array => Err(TypeError::NestedArray),
            ValueType::Unspecified => Err(TypeError::UnspecifiedElement),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value_type().fmt(f)
    }
}

// ---------------------------------------------------------------------------
// ByteString
// ---------------------------------------------------------------------------

/// An immutable byte string of at most [`MAX_STRING_LEN`] bytes.
///
/// The game server sends UTF-8, but nothing here relies on it: the bytes
/// are kept exactly as received, embedded NULs included. Use
/// [`as_str`](Self::as_str) when you need text.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteString(Vec<u8>);

impl ByteString {
    /// Creates a byte string, rejecting anything longer than
    /// [`MAX_STRING_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_STRING_LEN {
            return Err(ProtocolError::Argument {
                argument: "bytes",
                reason: ArgumentReason::TooLong {
                    len: bytes.len(),
                    max: MAX_STRING_LEN,
                },
            });
        }
        Ok(Self(bytes))
    }

    /// Length in bytes. Always fits in a `u16`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The contents as text, if they are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// The contents as text, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) => write!(f, "{s:?}"),
            None => write!(f, "{:?}", self.0),
        }
    }
}

impl fmt::Display for ByteString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&str> for ByteString {
    type Error = ProtocolError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s.as_bytes())
    }
}

impl TryFrom<String> for ByteString {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s.into_bytes())
    }
}

impl TryFrom<&[u8]> for ByteString {
    type Error = ProtocolError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl TryFrom<Vec<u8>> for ByteString {
    type Error = ProtocolError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl PartialEq<str> for ByteString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for ByteString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// Text round-trips as a JSON string; anything that is not UTF-8 falls
/// back to a byte sequence so no information is lost.
impl Serialize for ByteString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_bytes(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ByteString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ByteStringVisitor;

        impl<'de> Visitor<'de> for ByteStringVisitor {
            type Value = ByteString;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a string or byte sequence of at most {MAX_STRING_LEN} bytes")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteString, E> {
                ByteString::new(v.as_bytes()).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ByteString, E> {
                ByteString::new(v).map_err(E::custom)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ByteString, A::Error> {
                let mut bytes = Vec::new();
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                ByteString::new(bytes).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteStringVisitor)
    }
}

// ---------------------------------------------------------------------------
// WireInt
// ---------------------------------------------------------------------------

/// A fixed-width unsigned integer the protocol can carry.
///
/// Implemented for `u8`, `u32` and `u64`. The encoder, decoder, packet
/// setters and typed getters are all written once against this trait
/// instead of once per width.
pub trait WireInt: Copy + Into<Value> + sealed::Sealed + 'static {
    /// The array element type for this width.
    const ELEMENT: ElementType;
    /// Encoded size in bytes.
    const WIDTH: usize;

    /// Appends the big-endian encoding to `out`.
    fn put_be(self, out: &mut Vec<u8>);

    /// Reads from exactly [`WIDTH`](Self::WIDTH) big-endian bytes.
    /// Callers check the length first.
    fn from_be_slice(bytes: &[u8]) -> Self;

    /// Extracts the integer from a scalar value of this width.
    fn from_value(value: &Value) -> Option<Self>;

    /// Borrows the items of an array of this width.
    fn array_items(array: &ArrayValue) -> Option<&[Self]>;

    /// Wraps a vector of this width as an array.
    fn into_array(items: Vec<Self>) -> ArrayValue;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
}

macro_rules! be_array {
    ($bytes:expr, $n:literal) => {{
        let mut buf = [0u8; $n];
        buf.copy_from_slice(&$bytes[..$n]);
        buf
    }};
}

impl WireInt for u8 {
    const ELEMENT: ElementType = ElementType::UInt8;
    const WIDTH: usize = 1;

    fn put_be(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn from_be_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::UInt8(v) => Some(*v),
            _ => None,
        }
    }

    fn array_items(array: &ArrayValue) -> Option<&[Self]> {
        match array {
            ArrayValue::UInt8(items) => Some(items),
            _ => None,
        }
    }

    fn into_array(items: Vec<Self>) -> ArrayValue {
        ArrayValue::UInt8(items)
    }
}

impl WireInt for u32 {
    const ELEMENT: ElementType = ElementType::UInt32;
    const WIDTH: usize = 4;

    fn put_be(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn from_be_slice(bytes: &[u8]) -> Self {
        u32::from_be_bytes(be_array!(bytes, 4))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    fn array_items(array: &ArrayValue) -> Option<&[Self]> {
        match array {
            ArrayValue::UInt32(items) => Some(items),
            _ => None,
        }
    }

    fn into_array(items: Vec<Self>) -> ArrayValue {
        ArrayValue::UInt32(items)
    }
}

impl WireInt for u64 {
    const ELEMENT: ElementType = ElementType::UInt64;
    const WIDTH: usize = 8;

    fn put_be(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }

    fn from_be_slice(bytes: &[u8]) -> Self {
        u64::from_be_bytes(be_array!(bytes, 8))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    fn array_items(array: &ArrayValue) -> Option<&[Self]> {
        match array {
            ArrayValue::UInt64(items) => Some(items),
            _ => None,
        }
    }

    fn into_array(items: Vec<Self>) -> ArrayValue {
        ArrayValue::UInt64(items)
    }
}

// ---------------------------------------------------------------------------
// ArrayValue
// ---------------------------------------------------------------------------

/// A homogeneous array. The variant is the element type, so an array
/// holding two different types cannot be represented at all.
///
/// Serialized with an adjacent tag so a JSON dump reads
/// `{ "type": "UInt64", "items": [0, 1, 2] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items")]
pub enum ArrayValue {
    UInt8(Vec<u8>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Str(Vec<ByteString>),
}

impl ArrayValue {
    /// Builds an array from loosely typed values, checking that every item
    /// has type `element_type`.
    ///
    /// # Errors
    /// `InvalidType` if `element_type` is `Array` or `Unspecified`, or if
    /// any item's type disagrees with it.
    pub fn from_values(
        element_type: ValueType,
        values: Vec<Value>,
    ) -> Result<Self, ProtocolError> {
        let element = ElementType::try_from(element_type)?;
        let mismatch = |index: usize, value: &Value| TypeError::ElementMismatch {
            index,
            expected: element_type,
            found: value.value_type(),
        };

        let array = match element {
            ElementType::UInt8 => Self::UInt8(collect_ints(values, mismatch)?),
            ElementType::UInt32 => Self::UInt32(collect_ints(values, mismatch)?),
            ElementType::UInt64 => Self::UInt64(collect_ints(values, mismatch)?),
            ElementType::Str => {
                let mut items = Vec::with_capacity(values.len());
                for (index, value) in values.into_iter().enumerate() {
                    match value {
                        Value::Str(s) => items.push(s),
                        other => return Err(mismatch(index, &other).into()),
                    }
                }
                Self::Str(items)
            }
        };
        Ok(array)
    }

    /// Builds a string array, checking each string's length.
    pub fn strings<I, S>(items: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let items = items
            .into_iter()
            .map(|s| ByteString::new(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Str(items))
    }

    /// The type shared by every item.
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Str(_) => ElementType::Str,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::UInt8(items) => items.len(),
            Self::UInt32(items) => items.len(),
            Self::UInt64(items) => items.len(),
            Self::Str(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the items as integers of width `T`, if that is the
    /// element type.
    pub fn ints<T: WireInt>(&self) -> Option<&[T]> {
        T::array_items(self)
    }

    /// Borrows the items as strings, if that is the element type.
    pub fn strs(&self) -> Option<&[ByteString]> {
        match self {
            Self::Str(items) => Some(items),
            _ => None,
        }
    }
}

fn collect_ints<T, F>(values: Vec<Value>, mismatch: F) -> Result<Vec<T>, TypeError>
where
    T: WireInt,
    F: Fn(usize, &Value) -> TypeError,
{
    values
        .iter()
        .enumerate()
        .map(|(index, value)| T::from_value(value).ok_or_else(|| mismatch(index, value)))
        .collect()
}

impl<T: WireInt> From<Vec<T>> for ArrayValue {
    fn from(items: Vec<T>) -> Self {
        T::into_array(items)
    }
}

impl From<Vec<ByteString>> for ArrayValue {
    fn from(items: Vec<ByteString>) -> Self {
        Self::Str(items)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// The contents of one packet slot.
///
/// This is a plain sum type: each arm owns its data and nothing aliases,
/// so there is no way to read a value as the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// A slot that has not been set yet. Encoding fails while any slot is
    /// still `Unspecified`.
    #[default]
    Unspecified,
    UInt8(u8),
    UInt32(u32),
    UInt64(u64),
    Str(ByteString),
    Array(ArrayValue),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Unspecified => ValueType::Unspecified,
            Self::UInt8(_) => ValueType::UInt8,
            Self::UInt32(_) => ValueType::UInt32,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Str(_) => ValueType::Str,
            Self::Array(_) => ValueType::Array,
        }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, Self::Unspecified)
    }

    /// Any integer width, widened to `u64`.
    pub fn as_integer(&self) -> Option<u64> {
        match self {
            Self::UInt8(v) => Some(u64::from(*v)),
            Self::UInt32(v) => Some(u64::from(*v)),
            Self::UInt64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::UInt8(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<ByteString> for Value {
    fn from(v: ByteString) -> Self {
        Self::Str(v)
    }
}

impl From<ArrayValue> for Value {
    fn from(v: ArrayValue) -> Self {
        Self::Array(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "?"),
            Self::UInt8(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{:?}", s.to_string_lossy()),
            Self::Array(array) => write!(f, "[{} x {}]", array.len(), array.element_type()),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
