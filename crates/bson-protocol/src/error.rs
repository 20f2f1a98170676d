//! Wire-level decoding errors.

use thiserror::Error;

/// Errors raised while decoding the binary document format.
///
/// Every variant is non-retryable: the bytes will not change on a second
/// attempt, so callers should surface the error rather than loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// A read needed more bytes than remain in the region.
    #[error("out of bounds: need {needed} bytes at offset {offset}, {remaining} remaining")]
    OutOfBounds {
        /// Cursor position at the time of the read.
        offset: usize,
        /// Bytes the operation needed.
        needed: usize,
        /// Bytes left in the region.
        remaining: usize,
    },

    /// A cstring ran to the end of the region without a null terminator.
    #[error("malformed cstring starting at offset {offset}: no terminator")]
    MalformedCString {
        /// Offset where the cstring started.
        offset: usize,
    },

    /// `reset()` was called before any `mark()`.
    #[error("no mark set")]
    NoMarkSet,

    /// The cursor was used after `close()`.
    #[error("cursor is closed")]
    ClosedCursor,

    /// String bytes were not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the first string byte.
        offset: usize,
    },

    /// A length-prefixed string declared a length below one.
    #[error("invalid string length {length} at offset {offset}")]
    InvalidStringLength {
        /// Offset of the length prefix.
        offset: usize,
        /// The declared length.
        length: i32,
    },

    /// A length-prefixed string was not followed by its null byte.
    #[error("string at offset {offset} is missing its null terminator")]
    MissingStringTerminator {
        /// Offset of the length prefix.
        offset: usize,
    },

    /// A document or array header declared an impossible length.
    #[error("invalid document length {length} at offset {offset}")]
    InvalidDocumentLength {
        /// Offset of the length prefix.
        offset: usize,
        /// The declared length.
        length: i32,
    },

    /// The element type tag is not part of the wire format.
    #[error("unknown element type 0x{0:02X}")]
    UnknownElementType(u8),
}
