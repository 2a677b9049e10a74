use std::{mem, sync::Arc};

use crate::{
    slots::{LARGE_CAPACITY, SMALL_CAPACITY},
    PropertyValue,
};

use super::{PropertyMap, PropertyTable, Repr, Slots};

impl<V: PropertyValue, const N: usize> Slots<V, N> {
    /// Shares the key store and, unless a value had to be replaced, the value store.
    ///
    /// Returns whether the clone received a private value store.
    fn clone_with(&self, clone_owned: &mut impl FnMut(&V) -> Option<V>) -> (Self, bool) {
        let mut private_values: Option<[Option<V>; N]> = None;

        for (slot, (key, value)) in self.keys.iter().zip(self.values.iter()).enumerate() {
            let (false, Some(value)) = (key.is_zero(), value) else {
                continue;
            };
            if let Some(replacement) = clone_owned(value) {
                private_values.get_or_insert_with(|| (*self.values).clone())[slot] =
                    Some(replacement);
            }
        }

        let owns_values = private_values.is_some();
        let values = match private_values {
            Some(values) => Arc::new(values),
            None => self.values.clone(),
        };

        (
            Self {
                keys: self.keys.clone(),
                values,
            },
            owns_values,
        )
    }
}

fn clone_map_with<V: PropertyValue>(
    map: &Arc<PropertyMap<V>>,
    clone_owned: &mut impl FnMut(&V) -> Option<V>,
) -> (Arc<PropertyMap<V>>, bool) {
    let mut private_map: Option<PropertyMap<V>> = None;

    for (&key, value) in map.iter() {
        if let Some(replacement) = clone_owned(value) {
            private_map
                .get_or_insert_with(|| (**map).clone())
                .insert(key, replacement);
        }
    }

    match private_map {
        Some(private_map) => (Arc::new(private_map), true),
        None => (map.clone(), false),
    }
}

impl<V: PropertyValue> PropertyTable<V> {
    /// Returns a copy-on-write clone of this table.
    ///
    /// This is [`clone_shared_with`][Self::clone_shared_with] for tables that contain no values
    /// that need to be cloned individually.
    pub fn clone_shared(&mut self) -> Self {
        self.clone_shared_with(|_| None)
    }

    /// Returns a copy-on-write clone of this table, for a duplicated tree node.
    ///
    /// The clone initially shares the backing stores of this table, with neither table owning
    /// them, so that the first write to either table copies the store it modifies. This is why
    /// cloning requires mutable access to the source.
    ///
    /// `clone_owned` is called for every set value. It returns `None` for values that can be
    /// shared between both tables, and a replacement for values that are owned by this table's
    /// node and thus have to be deep-cloned for the new node. The first replacement makes the clone
    /// copy the value store right away.
    ///
    /// A map representation with at most 16 entries is compacted into an array representation
    /// before cloning, as tables that are cloned once are likely to be cloned again. Larger maps
    /// are shared as they are.
    pub fn clone_shared_with(&mut self, mut clone_owned: impl FnMut(&V) -> Option<V>) -> Self {
        self.check_invariant();

        self.compact();

        let cloned = match &self.repr {
            Repr::Empty => return Self::default(),
            Repr::Array8(slots) => {
                let (slots, owns_values) = slots.clone_with(&mut clone_owned);
                Self {
                    repr: Repr::Array8(slots),
                    owns_keys: false,
                    owns_values,
                }
            }
            Repr::Array16(slots) => {
                let (slots, owns_values) = slots.clone_with(&mut clone_owned);
                Self {
                    repr: Repr::Array16(slots),
                    owns_keys: false,
                    owns_values,
                }
            }
            Repr::Map(map) => {
                let (map, owns_values) = clone_map_with(map, &mut clone_owned);
                Self {
                    repr: Repr::Map(map),
                    owns_keys: false,
                    owns_values,
                }
            }
        };

        if !matches!(self.repr, Repr::Map(_)) {
            self.owns_keys = false;
        }
        if !cloned.owns_values {
            self.owns_values = false;
        } else {
            log::trace!("cloned property table with a private value store");
        }

        cloned.check_invariant();
        self.check_invariant();
        cloned
    }

    /// Converts a map representation with at most 16 entries into an array representation.
    fn compact(&mut self) {
        match mem::replace(&mut self.repr, Repr::Empty) {
            Repr::Map(map) if map.len() <= LARGE_CAPACITY => {
                let len = map.len();
                log::trace!("compacting property map with {len} entries");
                let entries = Arc::unwrap_or_clone(map);
                self.repr = if len < SMALL_CAPACITY {
                    Repr::Array8(Slots::from_entries(entries))
                } else {
                    Repr::Array16(Slots::from_entries(entries))
                };
                self.owns_keys = true;
                self.owns_values = true;
            }
            repr => self.repr = repr,
        }
    }
}
