//! Error types for the protocol layer.
//!
//! Every operation in this crate returns a [`ProtocolError`] rather than
//! panicking. Errors are plain owned values: they carry enough context to
//! name the field or slot that failed, and they can be formatted from any
//! thread without touching shared state.

use std::fmt;

use crate::types::ValueType;

/// Errors that can occur while building, encoding, decoding or verifying
/// packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An argument was invalid: an oversized string, an out-of-range slot
    /// index, or a buffer that does not hold enough bytes.
    ///
    /// `argument` names the parameter that was rejected (`"bytes"`,
    /// `"index"`, `"header"`, ...).
    #[error("invalid argument `{argument}`: {reason}")]
    Argument {
        argument: &'static str,
        reason: ArgumentReason,
    },

    /// A type tag was unknown or not allowed where it appeared.
    #[error("invalid type: {0}")]
    InvalidType(TypeError),

    /// A slot was never assigned a value before encoding.
    #[error("slot {slot} was never assigned a value")]
    UnspecifiedType { slot: usize },

    /// The requested operation has no counterpart in the protocol.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// A format descriptor passed to [`verify`](crate::verify) could not
    /// be parsed.
    #[error("invalid format descriptor at position {position}: {found:?}")]
    InvalidFormat { position: usize, found: char },

    /// The packet does not have the shape the format descriptor asks for.
    ///
    /// `slot` is the first position where the two disagree. When the
    /// descriptor and the packet have different lengths, `slot` is the
    /// length of the shorter one.
    #[error("packet does not match format at slot {slot}: expected {expected}, found {found}")]
    SchemaMismatch {
        slot: usize,
        expected: String,
        found: String,
    },

    /// Rendering a packet as JSON failed.
    #[cfg(feature = "json")]
    #[error("json rendering failed: {0}")]
    Json(#[source] serde_json::Error),
}

impl ProtocolError {
    /// Shorthand for a truncation error on `field`.
    pub(crate) fn truncated(field: Field, needed: usize, available: usize) -> Self {
        Self::Argument {
            argument: "bytes",
            reason: ArgumentReason::Truncated {
                field,
                needed,
                available,
            },
        }
    }

    /// Returns `true` if this error reports a buffer that ended before a
    /// field could be read in full.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::Argument {
                reason: ArgumentReason::Truncated { .. },
                ..
            }
        )
    }
}

/// Why an argument was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentReason {
    /// The buffer ends before `field` is complete.
    Truncated {
        field: Field,
        needed: usize,
        available: usize,
    },
    /// A length exceeds what its wire field can express.
    TooLong { len: usize, max: usize },
    /// A slot index is past the end of the packet.
    IndexOutOfRange { index: usize, len: usize },
    /// The frame's size prefix disagrees with the buffer it arrived in.
    LengthMismatch { declared: usize, actual: usize },
}

impl fmt::Display for ArgumentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                field,
                needed,
                available,
            } => write!(
                f,
                "truncated {field}: need {needed} bytes, have {available}"
            ),
            Self::TooLong { len, max } => {
                write!(f, "length {len} exceeds maximum {max}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} slots")
            }
            Self::LengthMismatch { declared, actual } => write!(
                f,
                "frame declares {declared} bytes but buffer holds {actual}"
            ),
        }
    }
}

/// Names a position inside a frame, used to locate decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The 4-byte size prefix.
    SizePrefix,
    /// Everything after the size prefix, as a whole.
    Body,
    /// The 2-byte header length.
    HeaderLength,
    /// The header bytes.
    Header,
    /// The 1-byte slot count.
    SlotCount,
    /// The type tag of a slot.
    SlotTag { slot: usize },
    /// The payload of a slot (for arrays: the count and element tag).
    Slot { slot: usize },
    /// One element of an array slot.
    ArrayElement { slot: usize, index: usize },
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizePrefix => write!(f, "size prefix"),
            Self::Body => write!(f, "frame body"),
            Self::HeaderLength => write!(f, "header length"),
            Self::Header => write!(f, "header"),
            Self::SlotCount => write!(f, "slot count"),
            Self::SlotTag { slot } => write!(f, "type tag of slot {slot}"),
            Self::Slot { slot } => write!(f, "slot {slot}"),
            Self::ArrayElement { slot, index } => {
                write!(f, "element {index} of slot {slot}")
            }
        }
    }
}

/// The specific type rule that was broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// A tag byte that names no known type.
    UnknownTag { tag: u8, field: Field },
    /// An array whose element type is itself an array.
    NestedArray,
    /// An array whose element type is `Unspecified`.
    UnspecifiedElement,
    /// An array item whose type differs from the array's element type.
    ElementMismatch {
        index: usize,
        expected: ValueType,
        found: ValueType,
    },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag { tag, field } => {
                write!(f, "unknown tag {tag} in {field}")
            }
            Self::NestedArray => write!(f, "arrays cannot contain arrays"),
            Self::UnspecifiedElement => {
                write!(f, "array element type must be specified")
            }
            Self::ElementMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "array item {index} is {found}, array holds {expected}"
            ),
        }
    }
}

impl From<TypeError> for ProtocolError {
    fn from(err: TypeError) -> Self {
        Self::InvalidType(err)
    }
}
