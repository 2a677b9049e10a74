//! Property values stored on tree nodes.
use core::fmt;
use std::sync::Arc;

use property_table::PropertyValue;

use crate::tree::NodeId;

/// The value of one property of a tree node.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    /// An explicitly unset value, distinct from an absent property.
    #[default]
    Null,
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A shared string.
    Str(Arc<str>),
    /// A detached node exclusively owned by this property.
    ///
    /// Cloning the holder's subtree deep-clones the template node, removing the property or the
    /// holder removes it.
    Template(NodeId),
}

impl Value {
    /// Returns the template node, if this is a template value.
    pub fn template(&self) -> Option<NodeId> {
        match *self {
            Value::Template(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }
}

impl PropertyValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.same_value(b),
            (Value::Str(a), Value::Str(b)) => a.same_value(b),
            (Value::Template(a), Value::Template(b)) => a == b,
            _ => false,
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
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::Str(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => fmt::Display::fmt(value, f),
            Value::Int(value) => fmt::Display::fmt(value, f),
            Value::Float(value) => fmt::Display::fmt(value, f),
            Value::Str(value) => fmt::Display::fmt(value, f),
            Value::Template(node) => write!(f, "#{node}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_are_the_same_value() {
        let a = Value::from("text");
        let b = Value::from(String::from("text"));
        assert!(a.same_value(&b));
        assert!(!a.same_value(&Value::from("other")));
    }

    #[test]
    fn floats_compare_by_bits() {
        let nan = Value::Float(f64::NAN);
        assert!(nan.same_value(&nan.clone()));
        assert!(!Value::Float(0.0).same_value(&Value::Float(-0.0)));
    }

    #[test]
    fn kinds_never_match() {
        assert!(!Value::Int(1).same_value(&Value::Float(1.0)));
        assert!(!Value::Null.same_value(&Value::Bool(false)));
    }
}
