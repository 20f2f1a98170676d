//! Position-tracked reader over a single byte region.
//!
//! `ByteCursor` decodes the primitive wire types of the binary document
//! format. All fixed-width values are little-endian. Reads either succeed
//! and advance the position, or fail and leave the position where it was.

use bytes::{Buf, Bytes};

use crate::element::{DOCUMENT_TERMINATOR, MIN_DOCUMENT_LEN, ObjectId};
use crate::error::WireError;

/// Sequential reader over an owned byte region.
///
/// The cursor holds one optional mark. Calling [`mark`](Self::mark) again
/// overwrites the previous mark; there is no mark stack.
#[derive(Debug, Clone)]
pub struct ByteCursor {
    /// `None` once the cursor has been closed.
    buf: Option<Bytes>,
    pos: usize,
    mark: Option<usize>,
}

impl ByteCursor {
    /// Create a cursor positioned at the start of `buf`.
    #[must_use]
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf: Some(buf),
            pos: 0,
            mark: None,
        }
    }

    /// Create a cursor over a copy of `data`.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    fn region(&self) -> Result<&Bytes, WireError> {
        self.buf.as_ref().ok_or(WireError::ClosedCursor)
    }

    /// Advance past `n` bytes and return them.
    fn take(&mut self, n: usize) -> Result<&[u8], WireError> {
        let pos = self.pos;
        let buf = self.buf.as_ref().ok_or(WireError::ClosedCursor)?;
        let remaining = buf.len() - pos;
        if n > remaining {
            return Err(WireError::OutOfBounds {
                offset: pos,
                needed: n,
                remaining,
            });
        }
        self.pos += n;
        Ok(&buf[pos..pos + n])
    }

    /// Run `f`, restoring the position if it fails.
    fn atomically<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<T, WireError> {
        let start = self.pos;
        let result = f(self);
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    /// Current offset into the region.
    pub fn position(&self) -> Result<usize, WireError> {
        self.region()?;
        Ok(self.pos)
    }

    /// Total length of the region.
    pub fn len(&self) -> Result<usize, WireError> {
        Ok(self.region()?.len())
    }

    /// Whether the region is empty.
    pub fn is_empty(&self) -> Result<bool, WireError> {
        Ok(self.region()?.is_empty())
    }

    /// Bytes left between the position and the end of the region.
    pub fn remaining(&self) -> Result<usize, WireError> {
        Ok(self.region()?.len() - self.pos)
    }

    /// Whether any bytes remain.
    pub fn has_remaining(&self) -> Result<bool, WireError> {
        Ok(self.remaining()? > 0)
    }

    /// Read one byte.
    pub fn read_byte(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean encoded as a single byte; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_byte()? != 0)
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        let mut bytes = self.take(4)?;
        Ok(bytes.get_i32_le())
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let mut bytes = self.take(4)?;
        Ok(bytes.get_u32_le())
    }

    /// Read a little-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        let mut bytes = self.take(8)?;
        Ok(bytes.get_i64_le())
    }

    /// Read a little-endian IEEE-754 `f64`.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        let mut bytes = self.take(8)?;
        Ok(bytes.get_f64_le())
    }

    /// Read the 12 raw bytes of an object id.
    pub fn read_object_id(&mut self) -> Result<ObjectId, WireError> {
        let mut id = [0u8; ObjectId::LEN];
        id.copy_from_slice(self.take(ObjectId::LEN)?);
        Ok(ObjectId::from_bytes(id))
    }

    /// Read the 16 raw bytes of a decimal128 value.
    pub fn read_decimal128(&mut self) -> Result<[u8; 16], WireError> {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(self.take(16)?);
        Ok(raw)
    }

    /// Read `n` bytes as a view sharing the cursor's storage.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes, WireError> {
        let start = self.pos;
        self.take(n)?;
        Ok(self.region()?.slice(start..start + n))
    }

    /// Read a whole length-prefixed document, prefix and terminator included,
    /// as a view sharing the cursor's storage.
    pub fn read_document_bytes(&mut self) -> Result<Bytes, WireError> {
        self.atomically(|cursor| {
            let offset = cursor.pos;
            let length = cursor.read_i32()?;
            if length < MIN_DOCUMENT_LEN as i32 {
                return Err(WireError::InvalidDocumentLength { offset, length });
            }
            cursor.pos = offset;
            let doc = cursor.read_bytes(length as usize)?;
            if doc[doc.len() - 1] != DOCUMENT_TERMINATOR {
                return Err(WireError::InvalidDocumentLength { offset, length });
            }
            Ok(doc)
        })
    }

    /// Read a length-prefixed string.
    ///
    /// The `i32` prefix counts the UTF-8 bytes plus the trailing null. The
    /// null is consumed but not returned.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        self.atomically(|cursor| {
            let offset = cursor.pos;
            let length = cursor.read_i32()?;
            if length < 1 {
                return Err(WireError::InvalidStringLength { offset, length });
            }
            let bytes = cursor.take(length as usize)?;
            let (text, terminator) = bytes.split_at(bytes.len() - 1);
            if terminator[0] != 0 {
                return Err(WireError::MissingStringTerminator { offset });
            }
            std::str::from_utf8(text)
                .map(str::to_owned)
                .map_err(|_| WireError::InvalidUtf8 { offset: offset + 4 })
        })
    }

    /// Distance from the position to the next null byte.
    fn scan_cstring(&self) -> Result<usize, WireError> {
        let buf = self.region()?;
        buf[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::MalformedCString { offset: self.pos })
    }

    /// Read a null-terminated string with no length prefix.
    ///
    /// The terminator is located first, then exactly the scanned span is
    /// decoded and the terminator consumed.
    pub fn read_cstring(&mut self) -> Result<String, WireError> {
        let len = self.scan_cstring()?;
        let offset = self.pos;
        self.atomically(|cursor| {
            let text = std::str::from_utf8(cursor.take(len)?)
                .map(str::to_owned)
                .map_err(|_| WireError::InvalidUtf8 { offset })?;
            cursor.take(1)?;
            Ok(text)
        })
    }

    /// Skip a null-terminated string, terminator included.
    pub fn skip_cstring(&mut self) -> Result<(), WireError> {
        let len = self.scan_cstring()?;
        self.take(len + 1)?;
        Ok(())
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), WireError> {
        self.take(n)?;
        Ok(())
    }

    /// Remember the current position, replacing any earlier mark.
    pub fn mark(&mut self) -> Result<(), WireError> {
        self.region()?;
        self.mark = Some(self.pos);
        Ok(())
    }

    /// Return to the marked position. The mark stays set.
    pub fn reset(&mut self) -> Result<(), WireError> {
        self.region()?;
        self.pos = self.mark.ok_or(WireError::NoMarkSet)?;
        Ok(())
    }

    /// Release the region. Every later operation fails with
    /// [`WireError::ClosedCursor`]. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.buf = None;
        self.mark = None;
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.buf.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_fixed_width_little_endian() {
        let mut data = Vec::new();
        data.push(0xAB);
        data.extend_from_slice(&(-2i32).to_le_bytes());
        data.extend_from_slice(&0x0102_0304_0506_0708i64.to_le_bytes());
        data.extend_from_slice(&1.5f64.to_le_bytes());

        let mut cursor = ByteCursor::from_slice(&data);
        assert_eq!(cursor.read_byte().unwrap(), 0xAB);
        assert_eq!(cursor.read_i32().unwrap(), -2);
        assert_eq!(cursor.read_i64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(cursor.read_f64().unwrap(), 1.5);
        assert!(!cursor.has_remaining().unwrap());
    }

    #[test]
    fn test_out_of_bounds_leaves_position() {
        let mut cursor = ByteCursor::from_slice(&[1, 2, 3]);
        cursor.skip(1).unwrap();
        let err = cursor.read_i32().unwrap_err();
        assert_eq!(
            err,
            WireError::OutOfBounds {
                offset: 1,
                needed: 4,
                remaining: 2
            }
        );
        assert_eq!(cursor.position().unwrap(), 1);
    }

    #[test]
    fn test_read_object_id() {
        let raw: Vec<u8> = (1..=12).collect();
        let mut cursor = ByteCursor::from_slice(&raw);
        let id = cursor.read_object_id().unwrap();
        assert_eq!(id.bytes(), &raw[..]);
        assert!(cursor.read_byte().is_err());
    }

    #[test]
    fn test_read_string() {
        let mut data = Vec::new();
        data.extend_from_slice(&6i32.to_le_bytes());
        data.extend_from_slice(b"hello\0");
        data.push(0x7F);

        let mut cursor = ByteCursor::from_slice(&data);
        assert_eq!(cursor.read_string().unwrap(), "hello");
        assert_eq!(cursor.read_byte().unwrap(), 0x7F);
    }

    #[test]
    fn test_read_string_without_terminator_fails_atomically() {
        let mut data = Vec::new();
        data.extend_from_slice(&3i32.to_le_bytes());
        data.extend_from_slice(b"abc");

        let mut cursor = ByteCursor::from_slice(&data);
        assert_eq!(
            cursor.read_string().unwrap_err(),
            WireError::MissingStringTerminator { offset: 0 }
        );
        assert_eq!(cursor.position().unwrap(), 0);
    }

    #[test]
    fn test_read_string_rejects_zero_length() {
        let mut cursor = ByteCursor::from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            cursor.read_string(),
            Err(WireError::InvalidStringLength { length: 0, .. })
        ));
    }

    #[test]
    fn test_read_cstring() {
        let mut cursor = ByteCursor::from_slice("héllo\0rest\0".as_bytes());
        assert_eq!(cursor.read_cstring().unwrap(), "héllo");
        assert_eq!(cursor.read_cstring().unwrap(), "rest");
        assert!(!cursor.has_remaining().unwrap());
    }

    #[test]
    fn test_read_cstring_empty() {
        let mut cursor = ByteCursor::from_slice(b"\0");
        assert_eq!(cursor.read_cstring().unwrap(), "");
        assert_eq!(cursor.position().unwrap(), 1);
    }

    #[test]
    fn test_malformed_cstring() {
        let mut cursor = ByteCursor::from_slice(b"abc");
        assert_eq!(
            cursor.read_cstring().unwrap_err(),
            WireError::MalformedCString { offset: 0 }
        );
        assert_eq!(
            cursor.skip_cstring().unwrap_err(),
            WireError::MalformedCString { offset: 0 }
        );
        assert_eq!(cursor.position().unwrap(), 0);
    }

    #[test]
    fn test_invalid_utf8_cstring() {
        let mut cursor = ByteCursor::from_slice(&[0xFF, 0xFE, 0x00]);
        assert_eq!(
            cursor.read_cstring().unwrap_err(),
            WireError::InvalidUtf8 { offset: 0 }
        );
        assert_eq!(cursor.position().unwrap(), 0);
    }

    #[test]
    fn test_skip_cstring() {
        let mut cursor = ByteCursor::from_slice(b"name\0\x2A");
        cursor.skip_cstring().unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 0x2A);
    }

    #[test]
    fn test_mark_and_reset() {
        let mut cursor = ByteCursor::from_slice(&[1, 2, 3, 4]);
        assert_eq!(cursor.reset().unwrap_err(), WireError::NoMarkSet);

        cursor.skip(1).unwrap();
        cursor.mark().unwrap();
        cursor.skip(2).unwrap();
        cursor.reset().unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 2);

        // re-marking overwrites
        cursor.mark().unwrap();
        cursor.skip(1).unwrap();
        cursor.reset().unwrap();
        assert_eq!(cursor.read_byte().unwrap(), 3);
    }

    #[test]
    fn test_read_bytes_shares_storage() {
        let source = Bytes::from_static(b"abcdef");
        let mut cursor = ByteCursor::new(source.clone());
        cursor.skip(2).unwrap();
        let view = cursor.read_bytes(3).unwrap();
        assert_eq!(&view[..], b"cde");
        assert_eq!(view.as_ptr(), source[2..].as_ptr());
    }

    #[test]
    fn test_closed_cursor() {
        let mut cursor = ByteCursor::from_slice(&[1, 2, 3, 4]);
        cursor.mark().unwrap();
        cursor.close();
        assert!(cursor.is_closed());
        assert_eq!(cursor.read_byte().unwrap_err(), WireError::ClosedCursor);
        assert_eq!(cursor.position().unwrap_err(), WireError::ClosedCursor);
        assert_eq!(cursor.has_remaining().unwrap_err(), WireError::ClosedCursor);
        assert_eq!(cursor.reset().unwrap_err(), WireError::ClosedCursor);
        assert_eq!(cursor.read_cstring().unwrap_err(), WireError::ClosedCursor);
        cursor.close();
    }
}
