//! Skipping values without decoding them.
//!
//! Key scans and element counts only need to step over payloads, so these
//! helpers move the cursor past one value using nothing but the length
//! information the wire format carries.

use crate::cursor::ByteCursor;
use crate::element::ElementType;
use crate::error::WireError;

/// Move the cursor past one value of type `ty`.
pub fn skip_value(cursor: &mut ByteCursor, ty: ElementType) -> Result<(), WireError> {
    match ty {
        ElementType::Undefined | ElementType::Null | ElementType::MinKey | ElementType::MaxKey => {
            Ok(())
        }
        ElementType::Boolean => cursor.skip(1),
        ElementType::Int32 => cursor.skip(4),
        ElementType::Double
        | ElementType::DateTime
        | ElementType::Timestamp
        | ElementType::Int64 => cursor.skip(8),
        ElementType::ObjectId => cursor.skip(12),
        ElementType::Decimal128 => cursor.skip(16),
        ElementType::String | ElementType::JavaScript | ElementType::Symbol => {
            skip_string(cursor)
        }
        ElementType::Document | ElementType::Array => {
            cursor.read_document_bytes()?;
            Ok(())
        }
        ElementType::Binary => {
            let offset = cursor.position()?;
            let length = cursor.read_i32()?;
            if length < 0 {
                return Err(WireError::InvalidDocumentLength { offset, length });
            }
            // subtype byte plus payload
            cursor.skip(1 + length as usize)
        }
        ElementType::Regex => {
            cursor.skip_cstring()?;
            cursor.skip_cstring()
        }
        ElementType::DbPointer => {
            skip_string(cursor)?;
            cursor.skip(12)
        }
        ElementType::JavaScriptWithScope => {
            let offset = cursor.position()?;
            let length = cursor.read_i32()?;
            // total length covers itself, the code string and the scope document
            if length < 4 + 5 + 5 {
                return Err(WireError::InvalidDocumentLength { offset, length });
            }
            cursor.skip(length as usize - 4)
        }
    }
}

fn skip_string(cursor: &mut ByteCursor) -> Result<(), WireError> {
    let offset = cursor.position()?;
    let length = cursor.read_i32()?;
    if length < 1 {
        return Err(WireError::InvalidStringLength { offset, length });
    }
    cursor.skip(length as usize)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::writer::DocumentWriter;

    #[test]
    fn test_skip_fixed_width() {
        let cases = [
            (ElementType::Null, 0),
            (ElementType::Boolean, 1),
            (ElementType::Int32, 4),
            (ElementType::Int64, 8),
            (ElementType::ObjectId, 12),
            (ElementType::Decimal128, 16),
        ];
        for (ty, width) in cases {
            let mut cursor = ByteCursor::from_slice(&[0u8; 20]);
            skip_value(&mut cursor, ty).unwrap();
            assert_eq!(cursor.position().unwrap(), width, "{ty:?}");
        }
    }

    #[test]
    fn test_skip_string() {
        let mut data = 4i32.to_le_bytes().to_vec();
        data.extend_from_slice(b"abc\0\x01");
        let mut cursor = ByteCursor::from_slice(&data);
        skip_value(&mut cursor, ElementType::String).unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 1);
    }

    #[test]
    fn test_skip_embedded_document() {
        let mut inner = DocumentWriter::new();
        inner.append_i32("a", 1);
        inner.append_string("b", "two");
        let inner = inner.finish();

        let mut data = inner.to_vec();
        data.push(0x42);
        let mut cursor = ByteCursor::from_slice(&data);
        skip_value(&mut cursor, ElementType::Document).unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 0x42);
    }

    #[test]
    fn test_skip_binary() {
        let mut data = 3i32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0x00, 1, 2, 3, 0x42]);
        let mut cursor = ByteCursor::from_slice(&data);
        skip_value(&mut cursor, ElementType::Binary).unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 0x42);
    }

    #[test]
    fn test_skip_regex() {
        let mut cursor = ByteCursor::from_slice(b"^a.*\0i\0\x42");
        skip_value(&mut cursor, ElementType::Regex).unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 0x42);
    }

    #[test]
    fn test_skip_truncated_document() {
        let mut data = 40i32.to_le_bytes().to_vec();
        data.push(0);
        let mut cursor = ByteCursor::from_slice(&data);
        assert!(matches!(
            skip_value(&mut cursor, ElementType::Document),
            Err(WireError::OutOfBounds { .. })
        ));
    }
}
