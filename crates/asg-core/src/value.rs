//! Attribute field types and values.
//!
//! Every node kind declares a fixed list of typed fields. [`FieldType`] is the
//! declared type, [`Value`] the runtime value stored in a node. String fields
//! hold a [`StrKey`] into the graph's string table, never the text itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::StrKey;

/// Declared type of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I32,
    I64,
    F64,
    Str,
}

impl FieldType {
    /// The value a freshly created node holds for a field of this type.
    pub fn default_value(self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::U8 => Value::U8(0),
            FieldType::U16 => Value::U16(0),
            FieldType::U32 => Value::U32(0),
            FieldType::U64 => Value::U64(0),
            FieldType::I32 => Value::I32(0),
            FieldType::I64 => Value::I64(0),
            FieldType::F64 => Value::F64(0.0),
            FieldType::Str => Value::Str(StrKey::EMPTY),
        }
    }

    /// Fixed encoded width in bytes. Bools are bit-packed and report 0.
    pub fn byte_width(self) -> usize {
        match self {
            FieldType::Bool => 0,
            FieldType::U8 => 1,
            FieldType::U16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::Str => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::U8 => "u8",
            FieldType::U16 => "u16",
            FieldType::U32 => "u32",
            FieldType::U64 => "u64",
            FieldType::I32 => "i32",
            FieldType::I64 => "i64",
            FieldType::F64 => "f64",
            FieldType::Str => "str",
        };
        write!(f, "{}", name)
    }
}

/// Runtime value of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    F64(f64),
    Str(StrKey),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Bool(_) => FieldType::Bool,
            Value::U8(_) => FieldType::U8,
            Value::U16(_) => FieldType::U16,
            Value::U32(_) => FieldType::U32,
            Value::U64(_) => FieldType::U64,
            Value::I32(_) => FieldType::I32,
            Value::I64(_) => FieldType::I64,
            Value::F64(_) => FieldType::F64,
            Value::Str(_) => FieldType::Str,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str_key(&self) -> Option<StrKey> {
        match self {
            Value::Str(k) => Some(*k),
            _ => None,
        }
    }

    /// Widens any integer value to `u64`. Signed values are reinterpreted.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U8(v) => Some(v as u64),
            Value::U16(v) => Some(v as u64),
            Value::U32(v) => Some(v as u64),
            Value::U64(v) => Some(v),
            Value::I32(v) => Some(v as u64),
            Value::I64(v) => Some(v as u64),
            _ => None,
        }
    }

    /// Equality under which every value matches itself: two NaNs match, and
    /// so do `0.0` and `-0.0`.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::F64(a), Value::F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Little-endian bytes of a non-string value, used for hashing and
    /// encoding. Strings yield their key bytes; callers that need the text
    /// resolve it through the string table.
    pub fn le_bytes(&self) -> smallvec::SmallVec<[u8; 8]> {
        match *self {
            Value::Bool(b) => smallvec::smallvec![b as u8],
            Value::U8(v) => smallvec::smallvec![v],
            Value::U16(v) => v.to_le_bytes().into_iter().collect(),
            Value::U32(v) => v.to_le_bytes().into_iter().collect(),
            Value::U64(v) => v.to_le_bytes().into_iter().collect(),
            Value::I32(v) => v.to_le_bytes().into_iter().collect(),
            Value::I64(v) => v.to_le_bytes().into_iter().collect(),
            Value::F64(v) => v.to_le_bytes().into_iter().collect(),
            Value::Str(k) => k.0.to_le_bytes().into_iter().collect(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<StrKey> for Value {
    fn from(v: StrKey) -> Self {
        Value::Str(v)
    }
}
