//! Element type tags and the object id primitive.

use std::fmt;

use crate::error::WireError;

/// Wire-type tag identifying the payload that follows an element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    /// 64-bit IEEE-754 float.
    Double = 0x01,
    /// Length-prefixed UTF-8 string.
    String = 0x02,
    /// Embedded document.
    Document = 0x03,
    /// Array, encoded as a document keyed "0", "1", ...
    Array = 0x04,
    /// Binary data with a subtype byte.
    Binary = 0x05,
    /// Deprecated undefined value.
    Undefined = 0x06,
    /// 12-byte object id.
    ObjectId = 0x07,
    /// Boolean.
    Boolean = 0x08,
    /// Milliseconds since the Unix epoch.
    DateTime = 0x09,
    /// Null.
    Null = 0x0A,
    /// Regular expression: pattern and options cstrings.
    Regex = 0x0B,
    /// Deprecated DBPointer: namespace string and object id.
    DbPointer = 0x0C,
    /// JavaScript code.
    JavaScript = 0x0D,
    /// Deprecated symbol.
    Symbol = 0x0E,
    /// JavaScript code with a scope document.
    JavaScriptWithScope = 0x0F,
    /// 32-bit integer.
    Int32 = 0x10,
    /// Internal replication timestamp.
    Timestamp = 0x11,
    /// 64-bit integer.
    Int64 = 0x12,
    /// 128-bit decimal.
    Decimal128 = 0x13,
    /// Compares below every other value.
    MinKey = 0xFF,
    /// Compares above every other value.
    MaxKey = 0x7F,
}

impl ElementType {
    /// Every defined element type.
    pub const ALL: [ElementType; 21] = [
        Self::Double,
        Self::String,
        Self::Document,
        Self::Array,
        Self::Binary,
        Self::Undefined,
        Self::ObjectId,
        Self::Boolean,
        Self::DateTime,
        Self::Null,
        Self::Regex,
        Self::DbPointer,
        Self::JavaScript,
        Self::Symbol,
        Self::JavaScriptWithScope,
        Self::Int32,
        Self::Timestamp,
        Self::Int64,
        Self::Decimal128,
        Self::MinKey,
        Self::MaxKey,
    ];

    /// Create an element type from its tag byte.
    pub fn from_u8(value: u8) -> Result<Self, WireError> {
        match value {
            0x01 => Ok(Self::Double),
            0x02 => Ok(Self::String),
            0x03 => Ok(Self::Document),
            0x04 => Ok(Self::Array),
            0x05 => Ok(Self::Binary),
            0x06 => Ok(Self::Undefined),
            0x07 => Ok(Self::ObjectId),
            0x08 => Ok(Self::Boolean),
            0x09 => Ok(Self::DateTime),
            0x0A => Ok(Self::Null),
            0x0B => Ok(Self::Regex),
            0x0C => Ok(Self::DbPointer),
            0x0D => Ok(Self::JavaScript),
            0x0E => Ok(Self::Symbol),
            0x0F => Ok(Self::JavaScriptWithScope),
            0x10 => Ok(Self::Int32),
            0x11 => Ok(Self::Timestamp),
            0x12 => Ok(Self::Int64),
            0x13 => Ok(Self::Decimal128),
            0xFF => Ok(Self::MinKey),
            0x7F => Ok(Self::MaxKey),
            _ => Err(WireError::UnknownElementType(value)),
        }
    }

    /// The tag byte.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the payload is itself a length-prefixed document.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::Document | Self::Array)
    }
}

/// Tag byte that ends every document.
pub const DOCUMENT_TERMINATOR: u8 = 0x00;

/// Smallest well-formed document: the length prefix plus the terminator.
pub const MIN_DOCUMENT_LEN: usize = 5;

/// A 12-byte object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ObjectId::LEN]);

impl ObjectId {
    /// Encoded length in bytes.
    pub const LEN: usize = 12;

    /// Wrap raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Seconds since the epoch, stored big-endian in the first four bytes.
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_round_trip() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_u8(ty.as_u8()).unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_element_type() {
        assert_eq!(
            ElementType::from_u8(0x20).unwrap_err(),
            WireError::UnknownElementType(0x20)
        );
        assert!(ElementType::from_u8(DOCUMENT_TERMINATOR).is_err());
    }

    #[test]
    fn test_object_id_display() {
        let id = ObjectId::from_bytes([
            0x50, 0x7f, 0x1f, 0x77, 0xbc, 0xf8, 0x6c, 0xd7, 0x99, 0x43, 0x90, 0x11,
        ]);
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
        assert_eq!(id.timestamp(), 0x507f_1f77);
    }
}
