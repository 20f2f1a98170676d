//! Type-decoder registry: element type tag → decode function.
//!
//! Whenever a concrete [`Value`] has to be produced from bytes, the element's
//! tag is looked up here. The default registry knows every wire type;
//! callers can replace individual entries, for example to decode datetimes
//! differently or to refuse deprecated types.

use std::fmt;
use std::sync::Arc;

use bson_protocol::{ByteCursor, ElementType, MIN_DOCUMENT_LEN, WireError};
use once_cell::sync::Lazy;

use crate::document::Document;
use crate::error::{DocumentError, Result};
use crate::value::{Binary, Value};

/// Decodes the payload of one element, the cursor positioned just after the
/// element name. Embedded documents go through the context so their depth
/// is counted.
pub type DecodeFn = fn(&mut ByteCursor, &DecodeContext<'_>) -> Result<Value>;

/// Deepest document nesting accepted, counting the outermost document.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Binary subtype whose payload carries a redundant inner length.
const BINARY_SUBTYPE_OLD: u8 = 0x02;

static DEFAULT_REGISTRY: Lazy<Arc<DecoderRegistry>> =
    Lazy::new(|| Arc::new(DecoderRegistry::default()));

/// Shared registry with a decoder for every element type.
#[must_use]
pub fn default_registry() -> Arc<DecoderRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Lookup table from element type tag to [`DecodeFn`].
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: [Option<DecodeFn>; 256],
}

impl DecoderRegistry {
    /// A registry with no decoders at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: [None; 256],
        }
    }

    /// Install `decoder` for `ty`, returning the one it replaced.
    pub fn register(&mut self, ty: ElementType, decoder: DecodeFn) -> Option<DecodeFn> {
        self.decoders[usize::from(ty.as_u8())].replace(decoder)
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, ty: ElementType, decoder: DecodeFn) -> Self {
        self.register(ty, decoder);
        self
    }

    /// Remove the decoder for `ty`.
    pub fn unregister(&mut self, ty: ElementType) -> Option<DecodeFn> {
        self.decoders[usize::from(ty.as_u8())].take()
    }

    /// The decoder for a raw tag, if one is registered.
    #[must_use]
    pub fn get(&self, tag: u8) -> Option<DecodeFn> {
        self.decoders[usize::from(tag)]
    }

    /// Decode one top-level payload of type `tag`.
    pub fn decode(&self, tag: u8, cursor: &mut ByteCursor) -> Result<Value> {
        DecodeContext::new(self).decode(tag, cursor)
    }

    /// Decode a complete length-prefixed document at the cursor.
    pub fn decode_document(&self, cursor: &mut ByteCursor) -> Result<Document> {
        DecodeContext::new(self).decode_document(cursor)
    }

    /// Decode an array document, discarding its index keys.
    pub fn decode_array(&self, cursor: &mut ByteCursor) -> Result<Vec<Value>> {
        DecodeContext::new(self).decode_array(cursor)
    }

    /// Number of registered decoders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decoders.iter().filter(|d| d.is_some()).count()
    }

    /// Whether no decoder is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registry plus the nesting depth of the document being decoded.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    registry: &'a DecoderRegistry,
    depth: usize,
}

impl<'a> DecodeContext<'a> {
    /// Context for decoding outside any document.
    #[must_use]
    pub fn new(registry: &'a DecoderRegistry) -> Self {
        Self { registry, depth: 0 }
    }

    /// Context for the elements of an outermost document.
    #[must_use]
    pub fn top_level(registry: &'a DecoderRegistry) -> Self {
        Self { registry, depth: 1 }
    }

    /// The registry decoders are looked up in.
    #[must_use]
    pub fn registry(&self) -> &'a DecoderRegistry {
        self.registry
    }

    /// Number of documents enclosing the current element.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Decode one payload of type `tag`.
    pub fn decode(&self, tag: u8, cursor: &mut ByteCursor) -> Result<Value> {
        let decoder = self.registry.get(tag).ok_or(DocumentError::NoDecoder(tag))?;
        decoder(cursor, self)
    }

    /// Decode a complete length-prefixed document one level deeper.
    pub fn decode_document(&self, cursor: &mut ByteCursor) -> Result<Document> {
        let depth = self.depth + 1;
        if depth > MAX_NESTING_DEPTH {
            return Err(DocumentError::NestingTooDeep {
                limit: MAX_NESTING_DEPTH,
            });
        }
        let inner = Self {
            registry: self.registry,
            depth,
        };

        let start = cursor.position()?;
        let declared = cursor.read_i32()?;
        if declared < MIN_DOCUMENT_LEN as i32 {
            return Err(WireError::InvalidDocumentLength {
                offset: start,
                length: declared,
            }
            .into());
        }
        let end = start + declared as usize;

        let mut doc = Document::new();
        loop {
            let tag = cursor.read_byte()?;
            if tag == 0 {
                break;
            }
            let name = cursor.read_cstring()?;
            let value = inner.decode(tag, cursor)?;
            tracing::trace!(name = %name, tag = tag, depth, "decoded element");
            doc.insert(name, value);
            let pos = cursor.position()?;
            if pos >= end {
                // the terminator must still fit inside the declared length
                return Err(DocumentError::LengthMismatch {
                    declared,
                    actual: pos - start + 1,
                });
            }
        }

        let consumed = cursor.position()? - start;
        if consumed != declared as usize {
            return Err(DocumentError::LengthMismatch {
                declared,
                actual: consumed,
            });
        }
        Ok(doc)
    }

    /// Decode an array document, discarding its index keys.
    pub fn decode_array(&self, cursor: &mut ByteCursor) -> Result<Vec<Value>> {
        Ok(self
            .decode_document(cursor)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::empty()
            .with(ElementType::Double, |c, _| Ok(Value::Double(c.read_f64()?)))
            .with(ElementType::String, |c, _| Ok(Value::String(c.read_string()?)))
            .with(ElementType::Document, |c, r| {
                Ok(Value::Document(r.decode_document(c)?))
            })
            .with(ElementType::Array, |c, r| Ok(Value::Array(r.decode_array(c)?)))
            .with(ElementType::Binary, decode_binary)
            .with(ElementType::Undefined, |_, _| Ok(Value::Undefined))
            .with(ElementType::ObjectId, |c, _| {
                Ok(Value::ObjectId(c.read_object_id()?))
            })
            .with(ElementType::Boolean, |c, _| Ok(Value::Boolean(c.read_bool()?)))
            .with(ElementType::DateTime, |c, _| Ok(Value::DateTime(c.read_i64()?)))
            .with(ElementType::Null, |_, _| Ok(Value::Null))
            .with(ElementType::Regex, |c, _| {
                let pattern = c.read_cstring()?;
                let options = c.read_cstring()?;
                Ok(Value::Regex { pattern, options })
            })
            .with(ElementType::DbPointer, |c, _| {
                let namespace = c.read_string()?;
                let id = c.read_object_id()?;
                Ok(Value::DbPointer { namespace, id })
            })
            .with(ElementType::JavaScript, |c, _| {
                Ok(Value::JavaScript(c.read_string()?))
            })
            .with(ElementType::Symbol, |c, _| Ok(Value::Symbol(c.read_string()?)))
            .with(ElementType::JavaScriptWithScope, decode_javascript_with_scope)
            .with(ElementType::Int32, |c, _| Ok(Value::Int32(c.read_i32()?)))
            .with(ElementType::Timestamp, |c, _| {
                let increment = c.read_u32()?;
                let time = c.read_u32()?;
                Ok(Value::Timestamp { time, increment })
            })
            .with(ElementType::Int64, |c, _| Ok(Value::Int64(c.read_i64()?)))
            .with(ElementType::Decimal128, |c, _| {
                Ok(Value::Decimal128(c.read_decimal128()?))
            })
            .with(ElementType::MinKey, |_, _| Ok(Value::MinKey))
            .with(ElementType::MaxKey, |_, _| Ok(Value::MaxKey))
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = (0..=u8::MAX)
            .filter(|t| self.get(*t).is_some())
            .map(|t| format!("0x{t:02X}"))
            .collect();
        f.debug_struct("DecoderRegistry")
            .field("tags", &tags)
            .finish()
    }
}

fn decode_binary(cursor: &mut ByteCursor, _: &DecodeContext<'_>) -> Result<Value> {
    let offset = cursor.position()?;
    let length = cursor.read_i32()?;
    if length < 0 {
        return Err(WireError::InvalidDocumentLength { offset, length }.into());
    }
    let subtype = cursor.read_byte()?;
    let bytes = if subtype == BINARY_SUBTYPE_OLD && length >= 4 {
        // payload repeats its own length
        let inner = cursor.read_i32()?;
        if inner != length - 4 {
            return Err(DocumentError::LengthMismatch {
                declared: length - 4,
                actual: inner.max(0) as usize,
            });
        }
        cursor.read_bytes(inner as usize)?
    } else {
        cursor.read_bytes(length as usize)?
    };
    Ok(Value::Binary(Binary { subtype, bytes }))
}

fn decode_javascript_with_scope(cursor: &mut ByteCursor, ctx: &DecodeContext<'_>) -> Result<Value> {
    let start = cursor.position()?;
    let declared = cursor.read_i32()?;
    let code = cursor.read_string()?;
    let scope = ctx.decode_document(cursor)?;
    let consumed = cursor.position()? - start;
    if declared < 0 || consumed != declared as usize {
        return Err(DocumentError::LengthMismatch {
            declared,
            actual: consumed,
        });
    }
    Ok(Value::JavaScriptWithScope { code, scope })
}
