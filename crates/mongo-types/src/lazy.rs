//! Immutable document view over undecoded bytes.
//!
//! A [`LazyDocument`] keeps the encoded document as its only state. Every
//! query opens a fresh [`ByteCursor`] and scans from the first element, so a
//! lookup costs O(n) in the document size each time it is made. Nothing
//! decoded is cached between calls.
//!
//! ## Immutability
//!
//! The bytes are the single source of truth. Editing in place would mean
//! re-encoding, which this type does not do; the map-style mutators exist
//! only so map-shaped callers get a typed
//! [`DocumentError::UnsupportedMutation`] instead of a missing method. Use
//! [`LazyDocument::to_document`] to get an owned, mutable [`Document`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;
use std::sync::Arc;

use bson_protocol::{
    ByteCursor, DOCUMENT_TERMINATOR, DocumentWriter, ElementType, MIN_DOCUMENT_LEN, WireError,
    skip_value,
};
use bytes::Bytes;

use crate::decode::{DocumentDecoder, MaterializeDecoder};
use crate::document::Document;
use crate::encode::DocumentEncoder;
use crate::error::{DocumentError, Result};
use crate::registry::{DecodeContext, DecoderRegistry, default_registry};
use crate::value::Value;

/// Wrap encoded document bytes without copying them.
#[must_use]
pub fn wrap_bytes(bytes: impl Into<Bytes>) -> LazyDocument {
    LazyDocument::from_bytes(bytes)
}

/// A read-only, map-shaped view over one encoded document.
#[derive(Clone)]
pub struct LazyDocument {
    bytes: Bytes,
    registry: Arc<DecoderRegistry>,
}

impl LazyDocument {
    /// Wrap encoded bytes, decoding values with the default registry.
    ///
    /// The bytes are not validated here; malformed input surfaces as an
    /// error from the first query that reaches the bad region.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::with_registry(bytes, default_registry())
    }

    /// Wrap encoded bytes, decoding values with `registry`.
    #[must_use]
    pub fn with_registry(bytes: impl Into<Bytes>, registry: Arc<DecoderRegistry>) -> Self {
        Self {
            bytes: bytes.into(),
            registry,
        }
    }

    /// Encode `value` with `encoder`, then wrap the result.
    pub fn from_value<T, E>(value: &T, encoder: &E) -> Result<Self>
    where
        T: ?Sized,
        E: DocumentEncoder<T>,
    {
        let mut writer = DocumentWriter::new();
        encoder.encode(value, &mut writer)?;
        Ok(Self::from_bytes(writer.finish()))
    }

    /// The encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Length of the encoded bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// The registry used for decoding values.
    #[must_use]
    pub fn registry(&self) -> &Arc<DecoderRegistry> {
        &self.registry
    }

    /// The bytes the header declares, after checking the declared length
    /// fits and ends on the terminator. Anything past it is ignored.
    fn declared_bytes(&self) -> Result<Bytes> {
        let declared = ByteCursor::new(self.bytes.clone()).read_i32()?;
        if declared < MIN_DOCUMENT_LEN as i32 || declared as usize > self.bytes.len() {
            return Err(DocumentError::LengthMismatch {
                declared,
                actual: self.bytes.len(),
            });
        }
        let end = declared as usize;
        if self.bytes[end - 1] != DOCUMENT_TERMINATOR {
            return Err(WireError::InvalidDocumentLength {
                offset: 0,
                length: declared,
            }
            .into());
        }
        Ok(self.bytes.slice(..end))
    }

    /// Cursor bounded to the declared length, positioned at the first element.
    fn open(&self) -> Result<ByteCursor> {
        let mut cursor = ByteCursor::new(self.declared_bytes()?);
        cursor.skip(4)?;
        Ok(cursor)
    }

    /// Walk the top-level elements. `visit` must consume the value it is
    /// handed, either by decoding or by skipping it.
    fn scan<T>(
        &self,
        mut visit: impl FnMut(&str, u8, &mut ByteCursor) -> Result<ControlFlow<T>>,
    ) -> Result<Option<T>> {
        let mut cursor = self.open()?;
        loop {
            let tag = cursor.read_byte()?;
            if tag == DOCUMENT_TERMINATOR {
                let consumed = cursor.position()?;
                let declared = cursor.len()?;
                if consumed != declared {
                    return Err(DocumentError::LengthMismatch {
                        declared: declared as i32,
                        actual: consumed,
                    });
                }
                return Ok(None);
            }
            let name = cursor.read_cstring()?;
            if let ControlFlow::Break(found) = visit(&name, tag, &mut cursor)? {
                return Ok(Some(found));
            }
        }
    }

    fn skip(tag: u8, cursor: &mut ByteCursor) -> Result<()> {
        skip_value(cursor, ElementType::from_u8(tag)?)?;
        Ok(())
    }

    /// Number of top-level elements.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        self.scan::<()>(|_, tag, cursor| {
            Self::skip(tag, cursor)?;
            count += 1;
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(count)
    }

    /// Whether the first element tag is the terminator.
    pub fn is_empty(&self) -> Result<bool> {
        let mut cursor = self.open()?;
        Ok(cursor.read_byte()? == DOCUMENT_TERMINATOR)
    }

    /// Whether a top-level element is named `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        let found = self.scan(|name, tag, cursor| {
            if name == key {
                return Ok(ControlFlow::Break(()));
            }
            Self::skip(tag, cursor)?;
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(found.is_some())
    }

    /// Whether any top-level value decodes equal to `value`.
    pub fn contains_value(&self, value: &Value) -> Result<bool> {
        let found = self.scan(|_, tag, cursor| {
            if DecodeContext::top_level(&self.registry).decode(tag, cursor)? == *value {
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(found.is_some())
    }

    /// Decode the value named `key`, or `None` if no element has that name.
    ///
    /// Only the matching value is decoded; earlier values are skipped.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.scan(|name, tag, cursor| {
            if name == key {
                let value = DecodeContext::top_level(&self.registry).decode(tag, cursor)?;
                return Ok(ControlFlow::Break(value));
            }
            Self::skip(tag, cursor)?;
            Ok(ControlFlow::Continue(()))
        })
    }

    /// The embedded document or array named `key` as another lazy view
    /// sharing this document's bytes.
    ///
    /// Returns `None` if the key is absent or holds a non-container value.
    pub fn get_lazy(&self, key: &str) -> Result<Option<LazyDocument>> {
        let found = self.scan(|name, tag, cursor| {
            if name != key {
                Self::skip(tag, cursor)?;
                return Ok(ControlFlow::Continue(()));
            }
            if !ElementType::from_u8(tag)?.is_container() {
                return Ok(ControlFlow::Break(None));
            }
            let bytes = cursor.read_document_bytes()?;
            Ok(ControlFlow::Break(Some(Self::with_registry(
                bytes,
                Arc::clone(&self.registry),
            ))))
        })?;
        Ok(found.flatten())
    }

    /// Run `decoder` over a fresh cursor on this document's declared bytes.
    pub fn decode_as<D: DocumentDecoder>(&self, decoder: &D) -> Result<D::Output> {
        let mut cursor = ByteCursor::new(self.declared_bytes()?);
        decoder.decode(&mut cursor, &self.registry)
    }

    /// Decode every element into an owned, mutable document.
    pub fn to_document(&self) -> Result<Document> {
        self.decode_as(&MaterializeDecoder)
    }

    /// All entries, in encoded order.
    pub fn entry_set(&self) -> Result<Vec<(String, Value)>> {
        Ok(self.to_document()?.into_iter().collect())
    }

    /// All keys, in encoded order.
    pub fn key_set(&self) -> Result<Vec<String>> {
        Ok(self.to_document()?.into_iter().map(|(k, _)| k).collect())
    }

    /// All values, in encoded order.
    pub fn values(&self) -> Result<Vec<Value>> {
        Ok(self.to_document()?.into_iter().map(|(_, v)| v).collect())
    }

    fn unsupported<T>(operation: &'static str) -> Result<T> {
        tracing::debug!(operation, "rejected mutation of lazy document");
        Err(DocumentError::UnsupportedMutation { operation })
    }

    /// Always fails with [`DocumentError::UnsupportedMutation`].
    pub fn put(&self, _key: &str, _value: Value) -> Result<Option<Value>> {
        Self::unsupported("put")
    }

    /// Always fails with [`DocumentError::UnsupportedMutation`].
    pub fn remove(&self, _key: &str) -> Result<Option<Value>> {
        Self::unsupported("remove")
    }

    /// Always fails with [`DocumentError::UnsupportedMutation`].
    pub fn clear(&self) -> Result<()> {
        Self::unsupported("clear")
    }

    /// Always fails with [`DocumentError::UnsupportedMutation`].
    pub fn append(&self, _key: &str, _value: Value) -> Result<()> {
        Self::unsupported("append")
    }

    /// Always fails with [`DocumentError::UnsupportedMutation`].
    pub fn put_all(&self, _entries: &Document) -> Result<()> {
        Self::unsupported("put_all")
    }
}

impl DocumentEncoder<LazyDocument> for crate::encode::DefaultEncoder {
    fn encode(&self, value: &LazyDocument, writer: &mut DocumentWriter) -> Result<()> {
        DocumentEncoder::<Document>::encode(self, &value.to_document()?, writer)
    }
}

impl PartialEq for LazyDocument {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_document(), other.to_document()) {
            (Ok(a), Ok(b)) => a == b,
            // undecodable documents are only equal to identical bytes
            _ => self.bytes == other.bytes,
        }
    }
}

impl Eq for LazyDocument {}

impl Hash for LazyDocument {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.to_document() {
            Ok(doc) => doc.hash(state),
            Err(_) => self.bytes.hash(state),
        }
    }
}

impl From<Bytes> for LazyDocument {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for LazyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDocument")
            .field("byte_len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for LazyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_document() {
            Ok(doc) => write!(f, "{doc}"),
            Err(e) => write!(f, "<malformed document: {e}>"),
        }
    }
}
