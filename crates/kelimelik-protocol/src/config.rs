//! Stream parser configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ParserConfig
// ---------------------------------------------------------------------------

/// Limits for a [`StreamParser`](crate::StreamParser).
///
/// Missing fields fall back to the defaults when deserializing, so a
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Largest frame body (the value of the size prefix) the parser will
    /// buffer. Larger frames are skipped and counted as rejected, even
    /// though they are valid on the wire; see [`unlimited`](Self::unlimited).
    pub max_frame_len: u32,

    /// Capacity the pending buffer keeps between frames. Anything above
    /// this is released after each frame.
    pub retained_capacity: usize,
}

impl ParserConfig {
    /// Default frame limit: 16 MiB.
    pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

    /// A config that buffers frames of any size the size prefix can name.
    pub fn unlimited() -> Self {
        Self {
            max_frame_len: u32::MAX,
            ..Self::default()
        }
    }

    /// Returns `true` if a frame whose size prefix is `size` is accepted.
    pub fn allows(&self, size: u32) -> bool {
        size <= self.max_frame_len
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_frame_len: Self::DEFAULT_MAX_FRAME_LEN,
            retained_capacity: 64 * 1024,
        }
    }
}
