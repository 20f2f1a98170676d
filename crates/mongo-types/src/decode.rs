//! Decoders that turn a whole document's bytes into some other form.

use bson_protocol::ByteCursor;

use crate::document::Document;
use crate::error::Result;
use crate::registry::DecoderRegistry;

/// Turns the bytes of one document into `Output`.
///
/// The cursor is positioned at the document's length prefix. Closures with
/// the matching signature implement this trait too.
pub trait DocumentDecoder {
    /// Decoded form.
    type Output;

    /// Decode the document at the cursor.
    fn decode(&self, cursor: &mut ByteCursor, registry: &DecoderRegistry) -> Result<Self::Output>;
}

impl<F, T> DocumentDecoder for F
where
    F: Fn(&mut ByteCursor, &DecoderRegistry) -> Result<T>,
{
    type Output = T;

    fn decode(&self, cursor: &mut ByteCursor, registry: &DecoderRegistry) -> Result<T> {
        self(cursor, registry)
    }
}

/// Decodes every element through the registry into an eager [`Document`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterializeDecoder;

impl DocumentDecoder for MaterializeDecoder {
    type Output = Document;

    fn decode(&self, cursor: &mut ByteCursor, registry: &DecoderRegistry) -> Result<Document> {
        registry.decode_document(cursor)
    }
}
