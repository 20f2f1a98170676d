//! Document error types.

use bson_protocol::WireError;
use thiserror::Error;

/// Errors that can occur while decoding, encoding or querying documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// Byte-level decoding failed.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A mutator was called on an immutable document.
    #[error("unsupported mutation: {operation} on an immutable document")]
    UnsupportedMutation {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The registry has no decoder for the element type.
    #[error("no decoder registered for element type 0x{0:02X}")]
    NoDecoder(u8),

    /// The length prefix disagrees with the bytes actually consumed.
    #[error("document length mismatch: declared {declared}, found {actual}")]
    LengthMismatch {
        /// Length from the document header.
        declared: i32,
        /// Length available or consumed.
        actual: usize,
    },

    /// Documents are nested deeper than the decoder accepts.
    #[error("document nesting exceeds {limit} levels")]
    NestingTooDeep {
        /// Deepest nesting accepted.
        limit: usize,
    },

    /// A key or cstring value contains a null byte and cannot be encoded.
    #[error("invalid key {0:?}: contains a null byte")]
    InvalidKey(String),
}

impl DocumentError {
    /// Whether this error came from a rejected mutation rather than bad bytes.
    #[must_use]
    pub fn is_unsupported_mutation(&self) -> bool {
        matches!(self, Self::UnsupportedMutation { .. })
    }
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
