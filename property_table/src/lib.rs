//! Compact per-node property tables with copy-on-write cloning.
//!
//! Every node of a property tree stores its properties in a [`PropertyTable`], which maps a
//! [`PropertyId`] to a value. Almost all nodes carry between zero and sixteen properties, so tables
//! start out as small parallel key/value arrays that are searched linearly and only switch to a
//! hash map when a node carries more. Whole subtrees can be duplicated cheaply, as cloned tables
//! share their backing stores until one of them is modified.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::undocumented_unsafe_blocks)]

mod property_id;
mod property_table;
pub mod slots;
mod value;

pub use property_id::PropertyId;
pub use property_table::{GroupIter, Iter, PropertyGroup, PropertyMap, PropertyTable, TableState};
pub use value::PropertyValue;
