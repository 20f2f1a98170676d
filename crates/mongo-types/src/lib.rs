//! # mongo-types
//!
//! Document values and the two document representations built on them.
//!
//! - [`Document`] is an owned, ordered, mutable map of [`Value`]s.
//! - [`LazyDocument`] wraps encoded bytes and decodes on demand. It never
//!   changes after construction.
//!
//! Decoding is table driven: a [`DecoderRegistry`] maps each element type
//! tag to a function that reads one value from a
//! [`ByteCursor`](bson_protocol::ByteCursor). Callers can replace entries to
//! change how individual types materialize.
//!
//! ## Features
//!
//! - `chrono` (default): [`Value::as_datetime`] conversion via chrono
//!
//! ## Example
//!
//! ```
//! use mongo_types::{Document, LazyDocument, Value, encode_document};
//!
//! let bytes = encode_document(&Document::new().with("x", 1)).unwrap();
//! let doc = LazyDocument::from_bytes(bytes);
//! assert_eq!(doc.get("x").unwrap(), Some(Value::Int32(1)));
//! assert!(doc.put("y", Value::Null).is_err());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decode;
pub mod document;
pub mod encode;
pub mod error;
pub mod lazy;
pub mod registry;
pub mod value;

pub use decode::{DocumentDecoder, MaterializeDecoder};
pub use document::Document;
pub use encode::{DefaultEncoder, DocumentEncoder, encode_document, write_value};
pub use error::{DocumentError, Result};
pub use lazy::{LazyDocument, wrap_bytes};
pub use registry::{
    DecodeContext, DecodeFn, DecoderRegistry, MAX_NESTING_DEPTH, default_registry,
};
pub use value::{Binary, Value};
