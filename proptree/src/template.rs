//! Property sets shared by many nodes.
use std::sync::Arc;

use property_table::{
    slots::{LARGE_CAPACITY, SMALL_CAPACITY},
    PropertyId, PropertyMap, PropertyTable,
};

use crate::{error::TemplateError, value::Value};

/// A fixed set of properties applied to many nodes without copying.
///
/// Small sets are stored as parallel key and value arrays in the layout of a property table, large
/// sets as a map. Applying a template to a node without properties only attaches these stores, the
/// node's table copies them on its first modification.
#[derive(Clone, Debug)]
pub struct PropertyTemplate {
    stores: Stores,
    len: usize,
}

#[derive(Clone, Debug)]
enum Stores {
    Slots {
        keys: Arc<[PropertyId]>,
        values: Arc<[Option<Value>]>,
    },
    Map(Arc<PropertyMap<Value>>),
}

impl PropertyTemplate {
    /// Builds a template from its entries, with later entries replacing earlier ones.
    pub fn new(
        entries: impl IntoIterator<Item = (PropertyId, Value)>,
    ) -> Result<Self, TemplateError> {
        let mut map = PropertyMap::default();
        for (id, value) in entries {
            if !id.is_assignable() {
                return Err(TemplateError::Unassignable(id));
            }
            if value.template().is_some() {
                return Err(TemplateError::OwnedValue(id));
            }
            map.insert(id, value);
        }

        let len = map.len();
        if len > LARGE_CAPACITY {
            return Ok(Self {
                stores: Stores::Map(Arc::new(map)),
                len,
            });
        }

        let capacity = if len <= SMALL_CAPACITY {
            SMALL_CAPACITY
        } else {
            LARGE_CAPACITY
        };
        let mut entries: Vec<_> = map.into_iter().collect();
        entries.sort_unstable_by_key(|&(id, _)| id);

        let mut keys = vec![PropertyId::ZERO; capacity];
        let mut values = vec![None; capacity];
        for (slot, (id, value)) in entries.into_iter().enumerate() {
            keys[slot] = id;
            values[slot] = Some(value);
        }

        Ok(Self {
            stores: Stores::Slots {
                keys: keys.into(),
                values: values.into(),
            },
            len,
        })
    }

    /// Returns the number of properties.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the template sets no properties.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the value of a property.
    pub fn get(&self, id: PropertyId) -> Option<&Value> {
        match &self.stores {
            Stores::Slots { keys, values } => {
                let slot = keys.iter().position(|&key| key == id && !key.is_zero())?;
                values[slot].as_ref()
            }
            Stores::Map(map) => map.get(&id),
        }
    }

    /// Enumerates the properties.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &Value)> + '_ {
        let (slots, map) = match &self.stores {
            Stores::Slots { keys, values } => (Some(keys.iter().zip(values.iter())), None),
            Stores::Map(map) => (None, Some(map.iter())),
        };
        let slots = slots
            .into_iter()
            .flatten()
            .filter_map(|(&key, value)| Some((key, value.as_ref()?)));
        let map = map.into_iter().flatten().map(|(&key, value)| (key, value));
        slots.chain(map)
    }

    /// Applies the properties to a table.
    ///
    /// An empty table attaches the shared stores, any other table receives each property.
    pub fn apply(&self, table: &mut PropertyTable<Value>) {
        if self.is_empty() {
            return;
        }
        match &self.stores {
            Stores::Slots { keys, values } => {
                table.assign_bulk(keys.clone(), values.clone(), false, false)
            }
            Stores::Map(map) => table.assign_bulk_map(map.clone(), false),
        }
    }
}
