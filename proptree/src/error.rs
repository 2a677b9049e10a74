use property_table::PropertyId;
use thiserror::Error;

use crate::value::Value;

/// Errors reported by [`PropertyDictionary`][crate::PropertyDictionary].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DictionaryError {
    /// The property is already set to a different value.
    #[error("property {property} is already set to {present:?}, cannot add {value:?}")]
    Conflict {
        /// Name of the property.
        property: String,
        /// The value that is already set.
        present: Value,
        /// The value that was to be added.
        value: Value,
    },

    /// The property id has a zero member id.
    #[error("property id {0} cannot be stored on a node")]
    Unassignable(PropertyId),
}

/// Errors reported while building a [`PropertyTemplate`][crate::PropertyTemplate].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The property id has a zero member id.
    #[error("property id {0} cannot be stored on a node")]
    Unassignable(PropertyId),

    /// Template nodes are owned by a single property and cannot be shared between nodes.
    #[error("property {0} holds a template node, which cannot be shared")]
    OwnedValue(PropertyId),
}
