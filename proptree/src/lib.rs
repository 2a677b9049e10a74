//! Control trees whose nodes store their properties in compact [`PropertyTable`]s.
//!
//! This crate contains the layers around the property tables: a [`Tree`] arena of nodes, shared
//! [`PropertyTemplate`]s attached to many nodes at once, a [`PropertyDictionary`] view of one
//! node's properties, and markup rendering. Properties are declared in a
//! [`Registry`][proptree_registry::Registry].
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

pub mod dictionary;
mod error;
pub mod render;
mod template;
pub mod tree;
mod value;

pub use dictionary::PropertyDictionary;
pub use error::{DictionaryError, TemplateError};
pub use template::PropertyTemplate;
pub use tree::{NodeId, Tree};
pub use value::Value;

pub use property_table::{PropertyId, PropertyTable, TableState};
