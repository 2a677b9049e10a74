//! Dictionary view of the properties of one node.
use property_table::{Iter, PropertyId, PropertyValue};
use proptree_registry::Registry;

use crate::{
    error::DictionaryError,
    tree::{missing_node, NodeId, Tree},
    value::Value,
};

/// Dictionary-style access to the properties of one node of a [`Tree`].
///
/// Writes go through the tree, so that template nodes held by replaced or removed properties are
/// removed with them. Values are compared with [`PropertyValue::same_value`].
pub struct PropertyDictionary<'a> {
    tree: &'a mut Tree,
    node: NodeId,
}

impl Tree {
    /// Returns a dictionary view of the properties of a node.
    #[track_caller]
    pub fn dictionary(&mut self, node: NodeId) -> PropertyDictionary<'_> {
        if self.get(node).is_none() {
            missing_node(node);
        }
        PropertyDictionary { tree: self, node }
    }
}

/// Returns the declared name of a property, falling back to its id.
pub fn property_name(id: PropertyId) -> String {
    match Registry::global().and_then(|registry| registry.property(id)) {
        Some(declaration) => declaration.to_string(),
        None => id.to_string(),
    }
}

impl<'a> PropertyDictionary<'a> {
    /// Returns the node whose properties are accessed.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the number of set properties.
    pub fn len(&self) -> usize {
        self.tree[self.node].properties().len()
    }

    /// Returns `true` if no property is set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value of a property.
    pub fn get(&self, id: PropertyId) -> Option<&Value> {
        self.tree[self.node].properties().get(id)
    }

    /// Returns `true` if the property is set.
    pub fn contains_key(&self, id: PropertyId) -> bool {
        self.tree[self.node].properties().contains(id)
    }

    /// Returns `true` if the property is set to the same value.
    pub fn contains_entry(&self, id: PropertyId, value: &Value) -> bool {
        self.get(id).is_some_and(|present| present.same_value(value))
    }

    /// Sets a property, replacing any present value.
    pub fn insert(&mut self, id: PropertyId, value: Value) -> Result<(), DictionaryError> {
        if !id.is_assignable() {
            return Err(DictionaryError::Unassignable(id));
        }
        self.tree.set(self.node, id, value);
        Ok(())
    }

    /// Adds a property that must not already be set to a different value.
    ///
    /// Adding a property that is already set to the same value succeeds without modifying it.
    pub fn add(&mut self, id: PropertyId, value: Value) -> Result<(), DictionaryError> {
        if !id.is_assignable() {
            return Err(DictionaryError::Unassignable(id));
        }
        if let Some(present) = self.get(id) {
            if present.same_value(&value) {
                return Ok(());
            }
            return Err(DictionaryError::Conflict {
                property: property_name(id),
                present: present.clone(),
                value,
            });
        }
        self.tree.try_add(self.node, id, value);
        Ok(())
    }

    /// Adds a property unless it is already set.
    ///
    /// Returns `false` if the property is already set to a different value.
    pub fn try_add(&mut self, id: PropertyId, value: Value) -> Result<bool, DictionaryError> {
        if !id.is_assignable() {
            return Err(DictionaryError::Unassignable(id));
        }
        Ok(self.tree.try_add(self.node, id, value))
    }

    /// Removes a property, returning `true` if it was set.
    pub fn remove(&mut self, id: PropertyId) -> bool {
        self.tree.remove_property(self.node, id)
    }

    /// Removes a property only if it is set to the same value.
    pub fn remove_entry(&mut self, id: PropertyId, value: &Value) -> bool {
        self.contains_entry(id, value) && self.remove(id)
    }

    /// Removes all properties.
    pub fn clear(&mut self) {
        self.tree.clear_properties(self.node)
    }

    /// Enumerates the set properties in unspecified order.
    pub fn iter(&self) -> Iter<'_, Value> {
        self.tree[self.node].properties().iter()
    }

    /// Enumerates the ids of the set properties.
    pub fn keys(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.iter().map(|(id, _)| id)
    }

    /// Enumerates the values of the set properties.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.iter().map(|(_, value)| value)
    }
}

impl<'b> IntoIterator for &'b PropertyDictionary<'_> {
    type Item = (PropertyId, &'b Value);
    type IntoIter = Iter<'b, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Extend<(PropertyId, Value)> for PropertyDictionary<'_> {
    /// Sets each property, panicking for unassignable ids.
    fn extend<T: IntoIterator<Item = (PropertyId, Value)>>(&mut self, iter: T) {
        for (id, value) in iter {
            self.tree.set(self.node, id, value);
        }
    }
}
