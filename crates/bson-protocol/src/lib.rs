//! # bson-protocol
//!
//! Byte-level implementation of the binary document format used by the
//! database wire protocol.
//!
//! This crate contains no networking logic and makes no assumptions about
//! the async runtime. It decodes primitives from a byte region, knows the
//! element type tag set, and can skip or encode values. Higher-level crates
//! build value types and lazy documents on top of it.
//!
//! ## Wire Format
//!
//! ```text
//! document := int32 total_length, element*, 0x00
//! element  := type_tag, cstring name, payload
//! string   := int32 length (incl. null), UTF-8 bytes, 0x00
//! cstring  := UTF-8 bytes, 0x00
//! ```
//!
//! All integers and floats are little-endian.
//!
//! ## Example
//!
//! ```rust
//! use bson_protocol::{ByteCursor, DocumentWriter, ElementType};
//!
//! let mut writer = DocumentWriter::new();
//! writer.append_i32("x", 1);
//! let doc = writer.finish();
//!
//! let mut cursor = ByteCursor::new(doc);
//! assert_eq!(cursor.read_i32().unwrap(), 12);
//! assert_eq!(ElementType::from_u8(cursor.read_byte().unwrap()).unwrap(), ElementType::Int32);
//! assert_eq!(cursor.read_cstring().unwrap(), "x");
//! assert_eq!(cursor.read_i32().unwrap(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cursor;
pub mod element;
pub mod error;
pub mod skip;
pub mod writer;

pub use cursor::ByteCursor;
pub use element::{DOCUMENT_TERMINATOR, ElementType, MIN_DOCUMENT_LEN, ObjectId};
pub use error::WireError;
pub use skip::skip_value;
pub use writer::{DocumentWriter, empty_document, put_cstring, put_string};
