//! Encoding typed values into document bytes.

use bson_protocol::DocumentWriter;
use bytes::Bytes;

use crate::document::Document;
use crate::error::{DocumentError, Result};
use crate::value::Value;

const BINARY_SUBTYPE_OLD: u8 = 0x02;

/// Writes the elements of a `T` into a document.
///
/// The writer already holds the length prefix; implementations only append
/// elements. Closures with the matching signature implement this trait too.
pub trait DocumentEncoder<T: ?Sized> {
    /// Append the elements of `value`.
    fn encode(&self, value: &T, writer: &mut DocumentWriter) -> Result<()>;
}

impl<T, F> DocumentEncoder<T> for F
where
    T: ?Sized,
    F: Fn(&T, &mut DocumentWriter) -> Result<()>,
{
    fn encode(&self, value: &T, writer: &mut DocumentWriter) -> Result<()> {
        self(value, writer)
    }
}

/// Encodes [`Document`]s element by element.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEncoder;

impl DocumentEncoder<Document> for DefaultEncoder {
    fn encode(&self, value: &Document, writer: &mut DocumentWriter) -> Result<()> {
        for (key, v) in value.iter() {
            write_value(writer, key, v)?;
        }
        Ok(())
    }
}

/// Encode a document to bytes.
pub fn encode_document(doc: &Document) -> Result<Bytes> {
    let mut writer = DocumentWriter::with_capacity(64 + doc.len() * 16);
    DefaultEncoder.encode(doc, &mut writer)?;
    Ok(writer.finish())
}

fn check_cstring(s: &str) -> Result<&str> {
    if s.as_bytes().contains(&0) {
        return Err(DocumentError::InvalidKey(s.to_owned()));
    }
    Ok(s)
}

/// Append one named value.
pub fn write_value(writer: &mut DocumentWriter, key: &str, value: &Value) -> Result<()> {
    let key = check_cstring(key)?;
    match value {
        Value::Double(v) => writer.append_f64(key, *v),
        Value::String(v) => writer.append_string(key, v),
        Value::Document(doc) => writer.append_document(key, &encode_document(doc)?),
        Value::Array(values) => {
            let mut array = DocumentWriter::new();
            for (i, v) in values.iter().enumerate() {
                write_value(&mut array, &i.to_string(), v)?;
            }
            writer.append_array(key, &array.finish());
        }
        Value::Binary(b) if b.subtype == BINARY_SUBTYPE_OLD => {
            // the old subtype repeats the payload length inside the payload
            let mut data = Vec::with_capacity(b.bytes.len() + 4);
            data.extend_from_slice(&(b.bytes.len() as i32).to_le_bytes());
            data.extend_from_slice(&b.bytes);
            writer.append_binary(key, b.subtype, &data);
        }
        Value::Binary(b) => writer.append_binary(key, b.subtype, &b.bytes),
        Value::Undefined => writer.append_undefined(key),
        Value::ObjectId(id) => writer.append_object_id(key, id),
        Value::Boolean(v) => writer.append_bool(key, *v),
        Value::DateTime(ms) => writer.append_datetime(key, *ms),
        Value::Null => writer.append_null(key),
        Value::Regex { pattern, options } => {
            writer.append_regex(key, check_cstring(pattern)?, check_cstring(options)?);
        }
        Value::DbPointer { namespace, id } => writer.append_db_pointer(key, namespace, id),
        Value::JavaScript(code) => writer.append_javascript(key, code),
        Value::Symbol(v) => writer.append_symbol(key, v),
        Value::JavaScriptWithScope { code, scope } => {
            writer.append_javascript_with_scope(key, code, &encode_document(scope)?);
        }
        Value::Int32(v) => writer.append_i32(key, *v),
        Value::Timestamp { time, increment } => writer.append_timestamp(key, *time, *increment),
        Value::Int64(v) => writer.append_i64(key, *v),
        Value::Decimal128(raw) => writer.append_decimal128(key, raw),
        Value::MinKey => writer.append_min_key(key),
        Value::MaxKey => writer.append_max_key(key),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::registry::DecoderRegistry;
    use bson_protocol::ByteCursor;

    #[test]
    fn test_encode_x_equals_one() {
        let bytes = encode_document(&Document::new().with("x", 1)).unwrap();
        assert_eq!(&bytes[..], &[12, 0, 0, 0, 0x10, b'x', 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_then_decode_nested() {
        let doc = Document::new()
            .with("name", "widget")
            .with("tags", vec![Value::from("a"), Value::from("b")])
            .with("dims", Document::new().with("w", 1.5).with("h", 2i64))
            .with("missing", Value::Null);

        let bytes = encode_document(&doc).unwrap();
        let decoded = DecoderRegistry::default()
            .decode_document(&mut ByteCursor::new(bytes))
            .unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_old_binary_subtype_round_trips() {
        let doc = Document::new().with(
            "b",
            Value::Binary(crate::value::Binary {
                subtype: 0x02,
                bytes: bytes::Bytes::from_static(b"abc"),
            }),
        );
        let bytes = encode_document(&doc).unwrap();
        // length 7, subtype, inner length 3, payload
        assert_eq!(&bytes[7..16], &[7, 0, 0, 0, 0x02, 3, 0, 0, 0]);
        let decoded = DecoderRegistry::default()
            .decode_document(&mut ByteCursor::new(bytes))
            .unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_key_with_null_is_rejected() {
        let doc = Document::new().with("a\0b", 1);
        assert_eq!(
            encode_document(&doc).unwrap_err(),
            DocumentError::InvalidKey("a\0b".into())
        );
    }

    #[test]
    fn test_closure_encoder() {
        let encoder = |pair: &(i32, i32), w: &mut DocumentWriter| -> Result<()> {
            w.append_i32("lo", pair.0);
            w.append_i32("hi", pair.1);
            Ok(())
        };
        let mut writer = DocumentWriter::new();
        encoder.encode(&(1, 2), &mut writer).unwrap();
        let decoded = DecoderRegistry::default()
            .decode_document(&mut ByteCursor::new(writer.finish()))
            .unwrap();
        assert_eq!(decoded, Document::new().with("lo", 1).with("hi", 2));
    }
}
