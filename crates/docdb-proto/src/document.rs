//! Document and value types for protocol messages.

use rkyv::{Archive, Deserialize, Serialize};

/// A document identifier: 16 opaque bytes assigned by the client or store.
pub type DocumentId = [u8; 16];

/// Field name of the document identifier.
pub const ID_FIELD: &str = "_id";

/// A runtime value that can be serialized over the wire.
///
/// Note: arrays are typed (e.g. BoolArray, Int64Array) to avoid recursive
/// type issues with rkyv serialization. Nested structure is expressed with
/// dot-notation field paths ("address.city") rather than nested values.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// Document identifier.
    Id(DocumentId),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of 64-bit integers.
    Int64Array(Vec<i64>),
    /// Array of 64-bit floats.
    Float64Array(Vec<f64>),
    /// Array of strings.
    StringArray(Vec<String>),
    /// Array of document identifiers.
    IdArray(Vec<DocumentId>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array type.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::BoolArray(_)
                | Value::Int64Array(_)
                | Value::Float64Array(_)
                | Value::StringArray(_)
                | Value::IdArray(_)
        )
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64 (widening from i32).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes reference.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as timestamp.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to get as document identifier.
    pub fn as_id(&self) -> Option<&DocumentId> {
        match self {
            Value::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DocumentId> for Value {
    fn from(v: DocumentId) -> Self {
        Value::Id(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Int64Array(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// A field name and value pair.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Field {
    /// Field name (dot-notation paths address nested structure).
    pub name: String,
    /// Field value.
    pub value: Value,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A document: an ordered list of named fields.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct Document {
    /// Document fields in insertion order.
    pub fields: Vec<Field>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self { fields: vec![] }
    }

    /// Create a document with an `_id` field.
    pub fn with_id(id: DocumentId) -> Self {
        Self {
            fields: vec![Field::new(ID_FIELD, id)],
        }
    }

    /// Add a field, replacing any existing field with the same name.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(Field { name, value }),
        }
        self
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Remove a field by name, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(pos).value)
    }

    /// Get the document identifier, if the `_id` field is set.
    pub fn id(&self) -> Option<&DocumentId> {
        self.get(ID_FIELD).and_then(Value::as_id)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check if a field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

impl FromIterator<Field> for Document {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
