//! Typed tick payloads.
//!
//! Every edge carries values of exactly one [`ValueType`], fixed at graph
//! build time. Payloads are modeled as a closed tagged union rather than
//! trait objects, keeping the scheduler hot path free of dynamic dispatch
//! on the data plane.

use serde::{Deserialize, Serialize};

use crate::types::{Span, Time};

/// The logical kind of values an edge carries.
///
/// Types are nominal for structs and enums: two struct types are equal iff
/// their declared names are equal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Boolean flag
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Engine timestamp (nanoseconds)
    Time,
    /// Engine time span (nanoseconds)
    Span,
    /// Short string
    Str,
    /// Named record with ordered fields
    Struct(String),
    /// Homogeneous array with the given element type
    Array(Box<ValueType>),
    /// Named enumeration
    Enum(String),
}

impl ValueType {
    /// Returns true if `value` is an inhabitant of this type.
    ///
    /// Arrays are checked element-wise; structs and enums are checked by
    /// declared name only (field layout is the producer's contract).
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Bool, Value::Bool(_)) => true,
            (ValueType::Int, Value::Int(_)) => true,
            (ValueType::Float, Value::Float(_)) => true,
            (ValueType::Time, Value::Time(_)) => true,
            (ValueType::Span, Value::Span(_)) => true,
            (ValueType::Str, Value::Str(_)) => true,
            (ValueType::Struct(name), Value::Struct(s)) => *name == s.name,
            (ValueType::Array(elem), Value::Array(items)) => {
                items.iter().all(|v| elem.admits(v))
            }
            (ValueType::Enum(name), Value::Enum(e)) => *name == e.name,
            _ => false,
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Time => write!(f, "time"),
            ValueType::Span => write!(f, "span"),
            ValueType::Str => write!(f, "str"),
            ValueType::Struct(name) => write!(f, "struct {}", name),
            ValueType::Array(elem) => write!(f, "[{}]", elem),
            ValueType::Enum(name) => write!(f, "enum {}", name),
        }
    }
}

/// A named record value with ordered fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructValue {
    /// Declared struct type name
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    /// Creates a new struct value.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A value of a named enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    /// Declared enum type name
    pub name: String,
    /// Selected variant
    pub variant: String,
}

/// A single typed tick payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// Engine timestamp
    Time(Time),
    /// Engine time span
    Span(Span),
    /// Short string
    Str(String),
    /// Named record
    Struct(StructValue),
    /// Homogeneous array
    Array(Vec<Value>),
    /// Enumeration value
    Enum(EnumValue),
}

impl Value {
    /// Creates a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Creates an enum value.
    pub fn enumeration(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Value::Enum(EnumValue {
            name: name.into(),
            variant: variant.into(),
        })
    }

    /// Wraps a (key, value) pair for delivery on a basket edge.
    ///
    /// Basket edges carry the output of keyed sub-graph instances; each
    /// sample is tagged with the instance key that produced it.
    pub fn keyed(key: &Key, value: Value) -> Self {
        Value::Struct(
            StructValue::new(KEYED_STRUCT)
                .with_field("key", key.to_value())
                .with_field("value", value),
        )
    }

    /// Returns the boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the floating-point payload, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Returns the timestamp payload, if this is a `Time`.
    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the span payload, if this is a `Span`.
    pub fn as_span(&self) -> Option<Span> {
        match self {
            Value::Span(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the struct payload, if this is a `Struct`.
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the array payload, if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Converts to a hashable discriminator key.
    ///
    /// Only scalar-ish kinds can key a sub-graph instance; floats, structs
    /// and arrays are rejected.
    pub fn to_key(&self) -> Option<Key> {
        match self {
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Time(t) => Some(Key::Time(*t)),
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::Enum(e) => Some(Key::Enum(e.clone())),
            _ => None,
        }
    }
}

/// Struct type name used for basket samples produced by [`Value::keyed`].
pub const KEYED_STRUCT: &str = "Keyed";

/// A hashable discriminator for keyed sub-graph instances.
///
/// Keys are the subset of [`Value`] kinds with total equality; they identify
/// one dynamically instantiated sub-graph per (template, key) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Boolean discriminator
    Bool(bool),
    /// Integer discriminator
    Int(i64),
    /// Timestamp discriminator
    Time(Time),
    /// String discriminator (the common case, e.g. a symbol)
    Str(String),
    /// Enum discriminator
    Enum(EnumValue),
}

impl Key {
    /// Creates a string key.
    pub fn str(s: impl Into<String>) -> Self {
        Key::Str(s.into())
    }

    /// Converts the key back to a plain value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Time(t) => Value::Time(*t),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Enum(e) => Value::Enum(e.clone()),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{}", b),
            Key::Int(i) => write!(f, "{}", i),
            Key::Time(t) => write!(f, "{}", t),
            Key::Str(s) => write!(f, "{}", s),
            Key::Enum(e) => write!(f, "{}::{}", e.name, e.variant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_admits_scalars() {
        assert!(ValueType::Int.admits(&Value::Int(42)));
        assert!(ValueType::Bool.admits(&Value::Bool(true)));
        assert!(!ValueType::Int.admits(&Value::Float(1.0)));
        assert!(!ValueType::Str.admits(&Value::Int(0)));
    }

    #[test]
    fn test_type_admits_array() {
        let ty = ValueType::Array(Box::new(ValueType::Int));
        assert!(ty.admits(&Value::Array(vec![Value::Int(1), Value::Int(2)])));
        assert!(!ty.admits(&Value::Array(vec![Value::Int(1), Value::Bool(false)])));
        // Empty arrays inhabit every array type
        assert!(ty.admits(&Value::Array(vec![])));
    }

    #[test]
    fn test_type_admits_struct_nominal() {
        let quote = Value::Struct(
            StructValue::new("Quote")
                .with_field("px", Value::Float(101.25))
                .with_field("qty", Value::Int(300)),
        );
        assert!(ValueType::Struct("Quote".to_string()).admits(&quote));
        assert!(!ValueType::Struct("Trade".to_string()).admits(&quote));
    }

    #[test]
    fn test_struct_field_lookup() {
        let s = StructValue::new("Quote")
            .with_field("px", Value::Float(99.5))
            .with_field("qty", Value::Int(100));
        assert_eq!(s.field("qty").and_then(Value::as_int), Some(100));
        assert!(s.field("missing").is_none());
    }

    #[test]
    fn test_to_key() {
        assert_eq!(Value::str("AAPL").to_key(), Some(Key::str("AAPL")));
        assert_eq!(Value::Int(7).to_key(), Some(Key::Int(7)));
        assert_eq!(Value::Float(1.5).to_key(), None);
        assert_eq!(Value::Array(vec![]).to_key(), None);
    }

    #[test]
    fn test_keyed_wrapper() {
        let key = Key::str("X");
        let v = Value::keyed(&key, Value::Time(1_100));
        let s = v.as_struct().unwrap();
        assert_eq!(s.name, KEYED_STRUCT);
        assert_eq!(s.field("key").and_then(Value::as_str), Some("X"));
        assert_eq!(s.field("value").and_then(Value::as_time), Some(1_100));
    }

    #[test]
    fn test_value_serialization() {
        let v = Value::Struct(
            StructValue::new("Pair")
                .with_field("a", Value::Int(1))
                .with_field("b", Value::Array(vec![Value::Bool(true)])),
        );
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
