//! Document encoding.

use bytes::{BufMut, Bytes, BytesMut};

use crate::element::{DOCUMENT_TERMINATOR, ElementType, ObjectId};

/// Builds a single document, patching the length prefix on [`finish`].
///
/// Element names are written as cstrings and must not contain a null byte;
/// validating that is the caller's job.
///
/// [`finish`]: DocumentWriter::finish
#[derive(Debug)]
pub struct DocumentWriter {
    buf: BytesMut,
}

impl DocumentWriter {
    /// Start an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Start an empty document with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = BytesMut::with_capacity(capacity.max(5));
        buf.put_i32_le(0);
        Self { buf }
    }

    /// Encoded length so far, excluding the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether no element has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.len() == 4
    }

    fn header(&mut self, ty: ElementType, name: &str) {
        self.buf.put_u8(ty.as_u8());
        put_cstring(&mut self.buf, name);
    }

    /// Append a double.
    pub fn append_f64(&mut self, name: &str, value: f64) {
        self.header(ElementType::Double, name);
        self.buf.put_f64_le(value);
    }

    /// Append a string.
    pub fn append_string(&mut self, name: &str, value: &str) {
        self.header(ElementType::String, name);
        put_string(&mut self.buf, value);
    }

    /// Append an already encoded embedded document.
    pub fn append_document(&mut self, name: &str, encoded: &[u8]) {
        self.header(ElementType::Document, name);
        self.buf.put_slice(encoded);
    }

    /// Append an already encoded array document.
    pub fn append_array(&mut self, name: &str, encoded: &[u8]) {
        self.header(ElementType::Array, name);
        self.buf.put_slice(encoded);
    }

    /// Append binary data.
    pub fn append_binary(&mut self, name: &str, subtype: u8, data: &[u8]) {
        self.header(ElementType::Binary, name);
        self.buf.put_i32_le(data.len() as i32);
        self.buf.put_u8(subtype);
        self.buf.put_slice(data);
    }

    /// Append the deprecated undefined value.
    pub fn append_undefined(&mut self, name: &str) {
        self.header(ElementType::Undefined, name);
    }

    /// Append an object id.
    pub fn append_object_id(&mut self, name: &str, id: &ObjectId) {
        self.header(ElementType::ObjectId, name);
        self.buf.put_slice(id.bytes());
    }

    /// Append a boolean.
    pub fn append_bool(&mut self, name: &str, value: bool) {
        self.header(ElementType::Boolean, name);
        self.buf.put_u8(u8::from(value));
    }

    /// Append a UTC datetime in milliseconds since the epoch.
    pub fn append_datetime(&mut self, name: &str, millis: i64) {
        self.header(ElementType::DateTime, name);
        self.buf.put_i64_le(millis);
    }

    /// Append null.
    pub fn append_null(&mut self, name: &str) {
        self.header(ElementType::Null, name);
    }

    /// Append a regular expression.
    pub fn append_regex(&mut self, name: &str, pattern: &str, options: &str) {
        self.header(ElementType::Regex, name);
        put_cstring(&mut self.buf, pattern);
        put_cstring(&mut self.buf, options);
    }

    /// Append a DBPointer.
    pub fn append_db_pointer(&mut self, name: &str, namespace: &str, id: &ObjectId) {
        self.header(ElementType::DbPointer, name);
        put_string(&mut self.buf, namespace);
        self.buf.put_slice(id.bytes());
    }

    /// Append JavaScript code.
    pub fn append_javascript(&mut self, name: &str, code: &str) {
        self.header(ElementType::JavaScript, name);
        put_string(&mut self.buf, code);
    }

    /// Append a symbol.
    pub fn append_symbol(&mut self, name: &str, symbol: &str) {
        self.header(ElementType::Symbol, name);
        put_string(&mut self.buf, symbol);
    }

    /// Append JavaScript code with an already encoded scope document.
    pub fn append_javascript_with_scope(&mut self, name: &str, code: &str, scope: &[u8]) {
        self.header(ElementType::JavaScriptWithScope, name);
        // int32 total + (int32 + bytes + null) + scope
        let total = 4 + 4 + code.len() + 1 + scope.len();
        self.buf.put_i32_le(total as i32);
        put_string(&mut self.buf, code);
        self.buf.put_slice(scope);
    }

    /// Append a 32-bit integer.
    pub fn append_i32(&mut self, name: &str, value: i32) {
        self.header(ElementType::Int32, name);
        self.buf.put_i32_le(value);
    }

    /// Append a timestamp. The increment occupies the low four bytes.
    pub fn append_timestamp(&mut self, name: &str, time: u32, increment: u32) {
        self.header(ElementType::Timestamp, name);
        self.buf.put_u32_le(increment);
        self.buf.put_u32_le(time);
    }

    /// Append a 64-bit integer.
    pub fn append_i64(&mut self, name: &str, value: i64) {
        self.header(ElementType::Int64, name);
        self.buf.put_i64_le(value);
    }

    /// Append the 16 raw bytes of a decimal128.
    pub fn append_decimal128(&mut self, name: &str, raw: &[u8; 16]) {
        self.header(ElementType::Decimal128, name);
        self.buf.put_slice(raw);
    }

    /// Append min key.
    pub fn append_min_key(&mut self, name: &str) {
        self.header(ElementType::MinKey, name);
    }

    /// Append max key.
    pub fn append_max_key(&mut self, name: &str) {
        self.header(ElementType::MaxKey, name);
    }

    /// Write the terminator and length prefix and return the document.
    #[must_use]
    pub fn finish(mut self) -> Bytes {
        self.buf.put_u8(DOCUMENT_TERMINATOR);
        let len = (self.buf.len() as i32).to_le_bytes();
        self.buf[..4].copy_from_slice(&len);
        self.buf.freeze()
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a cstring: UTF-8 bytes then a null.
pub fn put_cstring(dst: &mut impl BufMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

/// Write a length-prefixed string. The prefix counts the trailing null.
pub fn put_string(dst: &mut impl BufMut, s: &str) {
    dst.put_i32_le(s.len() as i32 + 1);
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

/// The five-byte empty document.
#[must_use]
pub fn empty_document() -> Bytes {
    DocumentWriter::with_capacity(5).finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        assert_eq!(&empty_document()[..], &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_single_int_document() {
        let mut writer = DocumentWriter::new();
        writer.append_i32("x", 1);
        let doc = writer.finish();
        assert_eq!(
            &doc[..],
            &[12, 0, 0, 0, 0x10, b'x', 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_string_encoding() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "hi");
        assert_eq!(&buf[..], &[3, 0, 0, 0, b'h', b'i', 0]);
    }

    #[test]
    fn test_javascript_with_scope_length() {
        let scope = empty_document();
        let mut writer = DocumentWriter::new();
        writer.append_javascript_with_scope("f", "x", &scope);
        let doc = writer.finish();
        // tag + "f\0" precede the total length
        let total = i32::from_le_bytes([doc[7], doc[8], doc[9], doc[10]]);
        assert_eq!(total, 4 + 4 + 2 + 5);
    }
}
