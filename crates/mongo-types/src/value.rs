//! Decoded document values.

use std::fmt;
use std::hash::{Hash, Hasher};

use bson_protocol::{ElementType, ObjectId};
use bytes::Bytes;

use crate::document::Document;

/// Binary payload with its subtype byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binary {
    /// Subtype byte (0x00 generic, 0x04 UUID, ...).
    pub subtype: u8,
    /// Payload bytes.
    pub bytes: Bytes,
}

/// A decoded value of any wire type.
///
/// Doubles compare and hash by bit pattern, so `NaN == NaN` and
/// `0.0 != -0.0`. This keeps `Eq` and `Hash` consistent, which documents
/// rely on for logical equality.
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Embedded document.
    Document(Document),
    /// Array.
    Array(Vec<Value>),
    /// Binary data.
    Binary(Binary),
    /// Deprecated undefined.
    Undefined,
    /// Object id.
    ObjectId(ObjectId),
    /// Boolean.
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    /// Null.
    Null,
    /// Regular expression.
    Regex {
        /// Pattern.
        pattern: String,
        /// Option flags.
        options: String,
    },
    /// Deprecated DBPointer.
    DbPointer {
        /// Collection namespace.
        namespace: String,
        /// Referenced id.
        id: ObjectId,
    },
    /// JavaScript code.
    JavaScript(String),
    /// Deprecated symbol.
    Symbol(String),
    /// JavaScript code with scope.
    JavaScriptWithScope {
        /// Code.
        code: String,
        /// Scope document.
        scope: Document,
    },
    /// 32-bit integer.
    Int32(i32),
    /// Replication timestamp.
    Timestamp {
        /// Seconds since the epoch.
        time: u32,
        /// Ordinal within the second.
        increment: u32,
    },
    /// 64-bit integer.
    Int64(i64),
    /// Raw IEEE 754-2008 decimal128 bytes.
    Decimal128([u8; 16]),
    /// Min key.
    MinKey,
    /// Max key.
    MaxKey,
}

impl Value {
    /// The wire type this value encodes as.
    #[must_use]
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Double(_) => ElementType::Double,
            Self::String(_) => ElementType::String,
            Self::Document(_) => ElementType::Document,
            Self::Array(_) => ElementType::Array,
            Self::Binary(_) => ElementType::Binary,
            Self::Undefined => ElementType::Undefined,
            Self::ObjectId(_) => ElementType::ObjectId,
            Self::Boolean(_) => ElementType::Boolean,
            Self::DateTime(_) => ElementType::DateTime,
            Self::Null => ElementType::Null,
            Self::Regex { .. } => ElementType::Regex,
            Self::DbPointer { .. } => ElementType::DbPointer,
            Self::JavaScript(_) => ElementType::JavaScript,
            Self::Symbol(_) => ElementType::Symbol,
            Self::JavaScriptWithScope { .. } => ElementType::JavaScriptWithScope,
            Self::Int32(_) => ElementType::Int32,
            Self::Timestamp { .. } => ElementType::Timestamp,
            Self::Int64(_) => ElementType::Int64,
            Self::Decimal128(_) => ElementType::Decimal128,
            Self::MinKey => ElementType::MinKey,
            Self::MaxKey => ElementType::MaxKey,
        }
    }

    /// Check if the value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an i32, if it is one.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an i64, widening 32-bit integers.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Int32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Symbol(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as an embedded document, if it is one.
    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as an array, if it is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as an object id, if it is one.
    #[must_use]
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Self::ObjectId(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a datetime value as a chrono UTC timestamp.
    #[cfg(feature = "chrono")]
    #[must_use]
    pub fn as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            Self::DateTime(millis) => chrono::DateTime::from_timestamp_millis(*millis),
            _ => None,
        }
    }

    /// Human-readable type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Document(_) => "document",
            Self::Array(_) => "array",
            Self::Binary(_) => "binary",
            Self::Undefined => "undefined",
            Self::ObjectId(_) => "objectId",
            Self::Boolean(_) => "bool",
            Self::DateTime(_) => "date",
            Self::Null => "null",
            Self::Regex { .. } => "regex",
            Self::DbPointer { .. } => "dbPointer",
            Self::JavaScript(_) => "javascript",
            Self::Symbol(_) => "symbol",
            Self::JavaScriptWithScope { .. } => "javascriptWithScope",
            Self::Int32(_) => "int",
            Self::Timestamp { .. } => "timestamp",
            Self::Int64(_) => "long",
            Self::Decimal128(_) => "decimal",
            Self::MinKey => "minKey",
            Self::MaxKey => "maxKey",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Document(a), Self::Document(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Binary(a), Self::Binary(b)) => a == b,
            (Self::Undefined, Self::Undefined) => true,
            (Self::ObjectId(a), Self::ObjectId(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (
                Self::Regex { pattern, options },
                Self::Regex {
                    pattern: p,
                    options: o,
                },
            ) => pattern == p && options == o,
            (
                Self::DbPointer { namespace, id },
                Self::DbPointer {
                    namespace: n,
                    id: i,
                },
            ) => namespace == n && id == i,
            (Self::JavaScript(a), Self::JavaScript(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (
                Self::JavaScriptWithScope { code, scope },
                Self::JavaScriptWithScope { code: c, scope: s },
            ) => code == c && scope == s,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (
                Self::Timestamp { time, increment },
                Self::Timestamp {
                    time: t,
                    increment: i,
                },
            ) => time == t && increment == i,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Decimal128(a), Self::Decimal128(b)) => a == b,
            (Self::MinKey, Self::MinKey) => true,
            (Self::MaxKey, Self::MaxKey) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Double(v) => v.to_bits().hash(state),
            Self::String(v) | Self::JavaScript(v) | Self::Symbol(v) => v.hash(state),
            Self::Document(v) => v.hash(state),
            Self::Array(v) => v.hash(state),
            Self::Binary(v) => v.hash(state),
            Self::ObjectId(v) => v.hash(state),
            Self::Boolean(v) => v.hash(state),
            Self::DateTime(v) | Self::Int64(v) => v.hash(state),
            Self::Regex { pattern, options } => {
                pattern.hash(state);
                options.hash(state);
            }
            Self::DbPointer { namespace, id } => {
                namespace.hash(state);
                id.hash(state);
            }
            Self::JavaScriptWithScope { code, scope } => {
                code.hash(state);
                scope.hash(state);
            }
            Self::Int32(v) => v.hash(state),
            Self::Timestamp { time, increment } => {
                time.hash(state);
                increment.hash(state);
            }
            Self::Decimal128(v) => v.hash(state),
            Self::Undefined | Self::Null | Self::MinKey | Self::MaxKey => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Document(v) => write!(f, "{v}"),
            Self::Array(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::Binary(b) => write!(
                f,
                "{{\"$binary\": {{\"subType\": \"{:02x}\", \"length\": {}}}}}",
                b.subtype,
                b.bytes.len()
            ),
            Self::Undefined => f.write_str("{\"$undefined\": true}"),
            Self::ObjectId(id) => write!(f, "{{\"$oid\": \"{id}\"}}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::DateTime(ms) => write!(f, "{{\"$date\": {ms}}}"),
            Self::Null => f.write_str("null"),
            Self::Regex { pattern, options } => write!(f, "/{pattern}/{options}"),
            Self::DbPointer { namespace, id } => {
                write!(f, "{{\"$dbPointer\": {{\"$ref\": {namespace:?}, \"$id\": \"{id}\"}}}}")
            }
            Self::JavaScript(code) => write!(f, "{{\"$code\": {code:?}}}"),
            Self::Symbol(v) => write!(f, "{{\"$symbol\": {v:?}}}"),
            Self::JavaScriptWithScope { code, scope } => {
                write!(f, "{{\"$code\": {code:?}, \"$scope\": {scope}}}")
            }
            Self::Int32(v) => write!(f, "{v}"),
            Self::Timestamp { time, increment } => {
                write!(f, "{{\"$timestamp\": {{\"t\": {time}, \"i\": {increment}}}}}")
            }
            Self::Int64(v) => write!(f, "{{\"$numberLong\": \"{v}\"}}"),
            Self::Decimal128(raw) => {
                f.write_str("{\"$numberDecimalBytes\": \"")?;
                for b in raw {
                    write!(f, "{b:02x}")?;
                }
                f.write_str("\"}")
            }
            Self::MinKey => f.write_str("{\"$minKey\": 1}"),
            Self::MaxKey => f.write_str("{\"$maxKey\": 1}"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Self::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Self::ObjectId(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
