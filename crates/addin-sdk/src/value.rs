//! Value - the runtime value model seen by the bridge
//!
//! Every value a script can hand to an add-in (or receive from one) is a
//! [`Value`]. The native ABI represents a subset of these kinds; the rest
//! (`Type`, `Object`) are rejected at encode time.
//!
//! # Numbers
//!
//! Numbers are `f64`. Integral numbers inside the `i32` range travel to the
//! native side as 32-bit integers, everything else as doubles.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::context::RuntimeObject;

/// Shared reference to a runtime object.
pub type ObjectRef = Arc<dyn RuntimeObject>;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value (also the result of a failed function call)
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean
    Boolean(bool),
    /// Number
    Number(f64),
    /// Calendar date and time, whole seconds
    Date(NaiveDateTime),
    /// String
    String(String),
    /// Binary data
    Binary(Vec<u8>),
    /// Type descriptor value, identified by type name
    Type(String),
    /// Object reference
    Object(ObjectRef),
}

/// The kind of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`Value::Undefined`]
    Undefined,
    /// [`Value::Null`]
    Null,
    /// [`Value::Boolean`]
    Boolean,
    /// [`Value::Number`]
    Number,
    /// [`Value::Date`]
    Date,
    /// [`Value::String`]
    String,
    /// [`Value::Binary`]
    Binary,
    /// [`Value::Type`]
    Type,
    /// [`Value::Object`]
    Object,
}

impl ValueKind {
    /// Kind name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Undefined => "Undefined",
            ValueKind::Null => "Null",
            ValueKind::Boolean => "Boolean",
            ValueKind::Number => "Number",
            ValueKind::Date => "Date",
            ValueKind::String => "String",
            ValueKind::Binary => "BinaryData",
            ValueKind::Type => "Type",
            ValueKind::Object => "Object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    /// Get the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Date(_) => ValueKind::Date,
            Value::String(_) => ValueKind::String,
            Value::Binary(_) => ValueKind::Binary,
            Value::Type(_) => ValueKind::Type,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Check if this is `Undefined`
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract date value
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Extract binary data
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Extract object reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get type name for debugging
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Value::Undefined"),
            Value::Null => write!(f, "Value::Null"),
            Value::Boolean(b) => write!(f, "Value::Boolean({})", b),
            Value::Number(n) => write!(f, "Value::Number({})", n),
            Value::Date(d) => write!(f, "Value::Date({})", d),
            Value::String(s) => write!(f, "Value::String({:?})", s),
            Value::Binary(b) => write!(f, "Value::Binary({} bytes)", b.len()),
            Value::Type(t) => write!(f, "Value::Type({})", t),
            Value::Object(o) => write!(f, "Value::Object({})", o.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Number(i as f64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}
