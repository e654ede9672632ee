//! Typed values stored in scopes.

use serde::{Deserialize, Serialize};

/// An integer tagged with the identity of the enumeration it belongs to.
///
/// Flag-style enumerations are stored as bit sets in `bits`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EnumCode {
    pub enum_type: String,
    pub bits: i64,
}

impl EnumCode {
    /// Create a code of the given enumeration.
    pub fn new(enum_type: impl Into<String>, bits: i64) -> Self {
        Self {
            enum_type: enum_type.into(),
            bits,
        }
    }

    /// The zero code of an enumeration.
    pub fn zero(enum_type: impl Into<String>) -> Self {
        Self::new(enum_type, 0)
    }

    /// Check whether every bit of `flag` is set on this code.
    pub fn has_flag(&self, flag: &EnumCode) -> bool {
        self.bits & flag.bits == flag.bits
    }
}

/// The declared type of a scoped key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Str,
    /// An enumeration code of the named enumeration.
    Enum(String),
}

impl ValueType {
    /// The zero-value returned when a key of this type is absent.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Str => Value::Str(String::new()),
            ValueType::Enum(enum_type) => Value::Enum(EnumCode::zero(enum_type.clone())),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Str => write!(f, "string"),
            ValueType::Enum(name) => write!(f, "enum:{}", name),
        }
    }
}

/// A value held by a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Enum(EnumCode),
}

impl Value {
    /// Get the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::Str,
            Value::Enum(code) => ValueType::Enum(code.enum_type.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<EnumCode> for Value {
    fn from(value: EnumCode) -> Self {
        Value::Enum(value)
    }
}

/// Rust types that a scoped value can be read as.
///
/// Implemented for the five value types: `bool`, `i64`, `f64`, `String` and
/// [`EnumCode`]. `Default` supplies the zero-value used for absent keys.
pub trait ScopeValue: Clone + Default + Into<Value> {
    /// Extract `Self` from a value of the matching type.
    fn from_value(value: &Value) -> Option<Self>;
}

impl ScopeValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl ScopeValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl ScopeValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl ScopeValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl ScopeValue for EnumCode {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Enum(code) => Some(code.clone()),
            _ => None,
        }
    }
}
