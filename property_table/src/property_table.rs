//! The per-node property table and its representations.
use core::fmt;
use std::{hash::BuildHasherDefault, mem, ops::Index, sync::Arc};

use hashbrown::HashMap;
use zwohash::ZwoHasher;

use crate::{
    slots::{self, SlotSearch, LARGE_CAPACITY, SMALL_CAPACITY},
    PropertyId, PropertyValue,
};

mod clone;
mod iter;

pub use iter::{GroupIter, Iter, PropertyGroup};

/// The unbounded representation used for tables with more than 16 properties.
pub type PropertyMap<V> = HashMap<PropertyId, V, BuildHasherDefault<ZwoHasher>>;

/// The active representation of a [`PropertyTable`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum TableState {
    /// No backing storage.
    Empty,
    /// Parallel key and value arrays with 8 slots.
    Array8,
    /// Parallel key and value arrays with 16 slots.
    Array16,
    /// A hash map holding all entries.
    Map,
}

/// Compact map from [`PropertyId`] to property values, used as the property store of a tree node.
///
/// This type is optimized for the use-case where almost every table holds 16 or fewer entries.
/// Such tables use two parallel arrays of 8 or 16 slots that are searched linearly. When a write
/// doesn't fit the current array, the table is promoted to the next larger representation, ending
/// with an unbounded [`PropertyMap`]. Promotion never reverses during writes, removing entries only
/// frees slots.
///
/// The backing stores can be shared between several tables. Cloning a table with
/// [`clone_shared`][Self::clone_shared] or attaching shared arrays with
/// [`assign_bulk`][Self::assign_bulk] doesn't copy anything. Instead each table tracks whether it
/// owns its key store and its value store and privatizes a store it doesn't own before the first
/// write to it. Ownership is decided by these flags alone, the [`Arc`]s holding the stores only
/// manage their lifetime.
///
/// # Examples
///
/// ```
/// use property_table::{PropertyId, PropertyTable, TableState};
///
/// let mut table = PropertyTable::default();
/// let text = PropertyId::pack(0, 1);
/// let visible = PropertyId::pack(0, 2);
///
/// table.set(text, "hello");
/// table.set(visible, "yes");
/// assert_eq!(table.state(), TableState::Array8);
/// assert_eq!(table.get(text), Some(&"hello"));
///
/// let mut clone = table.clone_shared();
/// clone.set(text, "bye");
/// assert_eq!(table[text], "hello");
/// assert_eq!(clone[text], "bye");
///
/// assert!(table.remove(visible));
/// assert_eq!(table.len(), 1);
/// ```
pub struct PropertyTable<V> {
    repr: Repr<V>,
    /// Whether the key array may be written without copying it first. Unused by the map state.
    owns_keys: bool,
    /// Whether the value array or the map may be written without copying it first.
    owns_values: bool,
}

enum Repr<V> {
    Empty,
    Array8(Slots<V, SMALL_CAPACITY>),
    Array16(Slots<V, LARGE_CAPACITY>),
    Map(Arc<PropertyMap<V>>),
}

/// Parallel key and value arrays; `keys[i]` is zero iff `values[i]` is `None`.
struct Slots<V, const N: usize> {
    keys: Arc<[PropertyId; N]>,
    values: Arc<[Option<V>; N]>,
}

impl<V> Default for PropertyTable<V> {
    fn default() -> Self {
        Self {
            repr: Repr::Empty,
            owns_keys: false,
            owns_values: false,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for PropertyTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn unassignable_id(id: PropertyId) -> ! {
    panic!("property id {id} has a zero member id and cannot be stored in a property table")
}

#[cold]
#[inline(never)]
#[track_caller]
fn bulk_len_mismatch(keys: usize, values: usize) -> ! {
    panic!("bulk assignment with {keys} keys but {values} values")
}

#[cold]
#[inline(never)]
#[track_caller]
fn unsupported_bulk_len(len: usize) -> ! {
    panic!(
        "bulk assignment requires exactly {SMALL_CAPACITY} or {LARGE_CAPACITY} slots, got {len}"
    )
}

#[cold]
#[inline(never)]
#[track_caller]
fn missing_property(id: PropertyId) -> ! {
    panic!("property {id} was not found")
}

impl<V, const N: usize> Slots<V, N> {
    fn empty() -> Self {
        Self {
            keys: Arc::new([PropertyId::ZERO; N]),
            values: Arc::new(std::array::from_fn(|_| None)),
        }
    }

    /// Attaches dynamically sized stores, failing if they don't have exactly `N` slots.
    #[track_caller]
    fn from_shared(keys: Arc<[PropertyId]>, values: Arc<[Option<V>]>) -> Self {
        let len = keys.len();
        match (
            <Arc<[PropertyId; N]>>::try_from(keys),
            <Arc<[Option<V>; N]>>::try_from(values),
        ) {
            (Ok(keys), Ok(values)) => Self { keys, values },
            _ => unsupported_bulk_len(len),
        }
    }

    /// Fills the slots in order, the caller ensures there are at most `N` entries.
    fn from_entries(entries: impl IntoIterator<Item = (PropertyId, V)>) -> Self {
        let mut keys = [PropertyId::ZERO; N];
        let mut values: [Option<V>; N] = std::array::from_fn(|_| None);
        for ((key, value), (key_slot, value_slot)) in entries
            .into_iter()
            .zip(keys.iter_mut().zip(values.iter_mut()))
        {
            *key_slot = key;
            *value_slot = Some(value);
        }
        Self {
            keys: Arc::new(keys),
            values: Arc::new(values),
        }
    }

    #[inline(always)]
    fn get(&self, id: PropertyId) -> Option<&V> {
        let slot = slots::find_slot(&self.keys, id)?;
        self.values[slot].as_ref()
    }

    fn aliases_keys(&self, keys: &Arc<[PropertyId]>) -> bool {
        Arc::as_ptr(&self.keys).cast::<PropertyId>() == Arc::as_ptr(keys).cast::<PropertyId>()
    }

    fn check(&self) {
        for (slot, (&key, value)) in self.keys.iter().zip(self.values.iter()).enumerate() {
            if key.is_zero() {
                assert!(value.is_none(), "unused slot {slot} holds a value");
            } else {
                assert!(key.is_assignable(), "invalid property id {key} at slot {slot}");
                assert!(value.is_some(), "property {key} at slot {slot} has no value");
                assert_eq!(
                    slots::find_slot(&self.keys, key),
                    Some(slot),
                    "duplicate property {key}"
                );
            }
        }
    }
}

impl<V: PropertyValue, const N: usize> Slots<V, N> {
    #[inline(always)]
    fn own_keys(&mut self, owns_keys: &mut bool) -> &mut [PropertyId; N] {
        if !*owns_keys {
            self.keys = Arc::new(*self.keys);
            *owns_keys = true;
        }
        Arc::make_mut(&mut self.keys)
    }

    #[inline(always)]
    fn own_values(&mut self, owns_values: &mut bool) -> &mut [Option<V>; N] {
        if !*owns_values {
            self.values = Arc::new((*self.values).clone());
            *owns_values = true;
        }
        Arc::make_mut(&mut self.values)
    }

    /// Returns the value back when all slots are in use.
    #[inline(always)]
    fn set(
        &mut self,
        owns_keys: &mut bool,
        owns_values: &mut bool,
        id: PropertyId,
        value: V,
    ) -> Result<(), V> {
        match slots::find_slot_or_free(&self.keys, id) {
            SlotSearch::Existing(slot) => {
                let unchanged = self.values[slot]
                    .as_ref()
                    .is_some_and(|present| present.same_value(&value));
                if !unchanged {
                    self.own_values(owns_values)[slot] = Some(value);
                }
            }
            SlotSearch::Free(slot) => {
                self.own_keys(owns_keys)[slot] = id;
                self.own_values(owns_values)[slot] = Some(value);
            }
            SlotSearch::Full => return Err(value),
        }
        Ok(())
    }

    /// Returns the value back when all slots are in use.
    #[inline(always)]
    fn try_add(
        &mut self,
        owns_keys: &mut bool,
        owns_values: &mut bool,
        id: PropertyId,
        value: V,
    ) -> Result<bool, V> {
        match slots::find_slot_or_free(&self.keys, id) {
            SlotSearch::Existing(slot) => Ok(self.values[slot]
                .as_ref()
                .is_some_and(|present| present.same_value(&value))),
            SlotSearch::Free(slot) => {
                self.own_keys(owns_keys)[slot] = id;
                self.own_values(owns_values)[slot] = Some(value);
                Ok(true)
            }
            SlotSearch::Full => Err(value),
        }
    }

    fn remove(&mut self, owns_keys: &mut bool, owns_values: &mut bool, id: PropertyId) -> bool {
        let Some(slot) = slots::find_slot(&self.keys, id) else {
            return false;
        };
        self.own_keys(owns_keys)[slot] = PropertyId::ZERO;
        self.own_values(owns_values)[slot] = None;
        true
    }

    /// Moves all live entries into a map, copying only when the value store is still shared.
    fn into_map(self) -> PropertyMap<V> {
        let mut map = PropertyMap::with_capacity_and_hasher(N + 1, Default::default());
        for (&key, value) in self.keys.iter().zip(Arc::unwrap_or_clone(self.values)) {
            if let (false, Some(value)) = (key.is_zero(), value) {
                map.insert(key, value);
            }
        }
        map
    }
}

impl<V: PropertyValue> Slots<V, SMALL_CAPACITY> {
    fn widen(self) -> Slots<V, LARGE_CAPACITY> {
        let mut keys = [PropertyId::ZERO; LARGE_CAPACITY];
        keys[..SMALL_CAPACITY].copy_from_slice(&self.keys[..]);
        let mut values: [Option<V>; LARGE_CAPACITY] = std::array::from_fn(|_| None);
        for (target, value) in values.iter_mut().zip(Arc::unwrap_or_clone(self.values)) {
            *target = value;
        }
        Slots {
            keys: Arc::new(keys),
            values: Arc::new(values),
        }
    }
}

fn own_map<'a, V: PropertyValue>(
    map: &'a mut Arc<PropertyMap<V>>,
    owns_values: &mut bool,
) -> &'a mut PropertyMap<V> {
    if !*owns_values {
        *map = Arc::new((**map).clone());
        *owns_values = true;
    }
    Arc::make_mut(map)
}

impl<V> PropertyTable<V> {
    /// Returns the active representation.
    pub fn state(&self) -> TableState {
        match self.repr {
            Repr::Empty => TableState::Empty,
            Repr::Array8(_) => TableState::Array8,
            Repr::Array16(_) => TableState::Array16,
            Repr::Map(_) => TableState::Map,
        }
    }

    /// Returns the value of a property, or `None` if it is not set.
    #[inline]
    pub fn get(&self, id: PropertyId) -> Option<&V> {
        match &self.repr {
            Repr::Array8(slots) => slots.get(id),
            Repr::Array16(slots) => slots.get(id),
            Repr::Map(map) => map.get(&id),
            Repr::Empty => None,
        }
    }

    /// Returns `true` if the property is set.
    #[inline]
    pub fn contains(&self, id: PropertyId) -> bool {
        match &self.repr {
            Repr::Array8(slots) => slots::contains_key(&slots.keys, id),
            Repr::Array16(slots) => slots::contains_key(&slots.keys, id),
            Repr::Map(map) => map.contains_key(&id),
            Repr::Empty => false,
        }
    }

    /// Returns `true` if any member of the given property group is set.
    ///
    /// For the map representation this scans all entries.
    pub fn contains_group(&self, group_id: u16) -> bool {
        match &self.repr {
            Repr::Array8(slots) => slots::contains_group(&slots.keys, group_id),
            Repr::Array16(slots) => slots::contains_group(&slots.keys, group_id),
            Repr::Map(map) => map.keys().any(|key| key.is_in_group(group_id)),
            Repr::Empty => false,
        }
    }

    /// Returns the number of set members of the given property group.
    ///
    /// For the map representation this scans all entries.
    pub fn count_group(&self, group_id: u16) -> usize {
        match &self.repr {
            Repr::Array8(slots) => slots::count_group(&slots.keys, group_id),
            Repr::Array16(slots) => slots::count_group(&slots.keys, group_id),
            Repr::Map(map) => map.keys().filter(|key| key.is_in_group(group_id)).count(),
            Repr::Empty => 0,
        }
    }

    /// Returns the number of set properties.
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Array8(slots) => slots::count_live(&slots.keys),
            Repr::Array16(slots) => slots::count_live(&slots.keys),
            Repr::Map(map) => map.len(),
            Repr::Empty => 0,
        }
    }

    /// Returns `true` if no property is set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all properties and releases the backing stores.
    pub fn clear(&mut self) {
        self.check_invariant();
        *self = Self::default();
    }

    /// Validates all representation invariants, panicking on a violation.
    ///
    /// With debug assertions enabled, this runs after every mutation.
    pub fn check(&self) {
        match &self.repr {
            Repr::Empty => {}
            Repr::Array8(slots) => slots.check(),
            Repr::Array16(slots) => slots.check(),
            Repr::Map(map) => {
                for key in map.keys() {
                    assert!(key.is_assignable(), "invalid property id {key} in map");
                }
            }
        }
    }

    #[inline(always)]
    fn check_invariant(&self) {
        if cfg!(debug_assertions) {
            self.check();
        }
    }
}

impl<V: PropertyValue> PropertyTable<V> {
    /// Sets the value of a property, replacing any present value.
    ///
    /// When the present value is the [same][PropertyValue::same_value] as the new value, the
    /// table is left unmodified. This means a store shared with another table stays shared.
    ///
    /// Panics if `id` has a zero member id.
    #[track_caller]
    pub fn set(&mut self, id: PropertyId, value: V) {
        if !id.is_assignable() {
            unassignable_id(id);
        }
        self.check_invariant();

        let mut value = value;
        loop {
            let Self {
                repr,
                owns_keys,
                owns_values,
            } = &mut *self;
            let rejected = match repr {
                Repr::Array8(slots) => slots.set(owns_keys, owns_values, id, value),
                Repr::Array16(slots) => slots.set(owns_keys, owns_values, id, value),
                Repr::Map(map) => {
                    let unchanged = map
                        .get(&id)
                        .is_some_and(|present| present.same_value(&value));
                    if !unchanged {
                        own_map(map, owns_values).insert(id, value);
                    }
                    Ok(())
                }
                Repr::Empty => Err(value),
            };
            match rejected {
                Ok(()) => break,
                Err(returned) => {
                    value = returned;
                    self.grow();
                }
            }
        }

        debug_assert!(self.contains(id), "{id} was not set");
        self.check_invariant();
    }

    /// Adds a property unless it is already set.
    ///
    /// Returns `true` if the property was added or if it was already set to the
    /// [same][PropertyValue::same_value] value. Returns `false`, leaving the table unmodified, if
    /// the property was already set to a different value.
    ///
    /// Panics if `id` has a zero member id.
    #[track_caller]
    pub fn try_add(&mut self, id: PropertyId, value: V) -> bool {
        if !id.is_assignable() {
            unassignable_id(id);
        }
        self.check_invariant();

        let mut value = value;
        let added = loop {
            let Self {
                repr,
                owns_keys,
                owns_values,
            } = &mut *self;
            let outcome = match repr {
                Repr::Array8(slots) => slots.try_add(owns_keys, owns_values, id, value),
                Repr::Array16(slots) => slots.try_add(owns_keys, owns_values, id, value),
                Repr::Map(map) => match map.get(&id) {
                    Some(present) => Ok(present.same_value(&value)),
                    None => {
                        own_map(map, owns_values).insert(id, value);
                        Ok(true)
                    }
                },
                Repr::Empty => Err(value),
            };
            match outcome {
                Ok(added) => break added,
                Err(returned) => {
                    value = returned;
                    self.grow();
                }
            }
        };

        self.check_invariant();
        added
    }

    /// Removes a property, returning `true` if it was set.
    pub fn remove(&mut self, id: PropertyId) -> bool {
        self.check_invariant();
        let Self {
            repr,
            owns_keys,
            owns_values,
        } = &mut *self;
        let removed = match repr {
            Repr::Array8(slots) => slots.remove(owns_keys, owns_values, id),
            Repr::Array16(slots) => slots.remove(owns_keys, owns_values, id),
            Repr::Map(map) => {
                map.contains_key(&id) && own_map(map, owns_values).remove(&id).is_some()
            }
            Repr::Empty => false,
        };
        self.check_invariant();
        removed
    }

    /// Initializes the table from parallel key and value stores of 8 or 16 slots.
    ///
    /// An empty table, or a table already using the given key store, attaches both stores as-is
    /// and takes the ownership flags as given. This allows many tables to share one pair of
    /// stores until they are individually modified, in which case the flags must be `false`. Any
    /// other table receives each entry via [`set`][Self::set].
    ///
    /// Unused slots have [`PropertyId::ZERO`] as key and `None` as value.
    ///
    /// Panics if the stores have different lengths or a length other than 8 or 16.
    #[track_caller]
    pub fn assign_bulk(
        &mut self,
        keys: Arc<[PropertyId]>,
        values: Arc<[Option<V>]>,
        owns_keys: bool,
        owns_values: bool,
    ) {
        self.check_invariant();
        if keys.len() != values.len() {
            bulk_len_mismatch(keys.len(), values.len());
        }

        let attach = match &self.repr {
            Repr::Empty => true,
            Repr::Array8(slots) => slots.aliases_keys(&keys),
            Repr::Array16(slots) => slots.aliases_keys(&keys),
            Repr::Map(_) => false,
        };

        if attach {
            self.repr = match keys.len() {
                SMALL_CAPACITY => Repr::Array8(Slots::from_shared(keys, values)),
                LARGE_CAPACITY => Repr::Array16(Slots::from_shared(keys, values)),
                len => unsupported_bulk_len(len),
            };
            self.owns_keys = owns_keys;
            self.owns_values = owns_values;
        } else {
            for (&key, value) in keys.iter().zip(values.iter()) {
                if let (false, Some(value)) = (key.is_zero(), value) {
                    self.set(key, value.clone());
                }
            }
        }

        self.check_invariant();
    }

    /// Initializes the table from a property map.
    ///
    /// An empty table, or a table already using the given map, attaches the map as-is with the
    /// given ownership flag. Otherwise, when `owns` is set, the present entries are merged into
    /// the map without overwriting its entries and the table switches to the map. When `owns` is
    /// not set, each entry of the map is added via [`set`][Self::set].
    pub fn assign_bulk_map(&mut self, map: Arc<PropertyMap<V>>, owns: bool) {
        self.check_invariant();

        let attach = match &self.repr {
            Repr::Empty => true,
            Repr::Map(present) => Arc::ptr_eq(present, &map),
            _ => false,
        };

        if attach {
            self.repr = Repr::Map(map);
            self.owns_keys = false;
            self.owns_values = owns;
        } else if owns {
            let mut map = map;
            let target = Arc::make_mut(&mut map);
            for (key, value) in self.iter() {
                target.entry(key).or_insert_with(|| value.clone());
            }
            self.repr = Repr::Map(map);
            self.owns_keys = false;
            self.owns_values = true;
        } else {
            for (&key, value) in map.iter() {
                self.set(key, value.clone());
            }
        }

        self.check_invariant();
    }

    /// Switches Empty to Array8, Array8 to Array16 or Array16 to Map.
    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let grown = match mem::replace(&mut self.repr, Repr::Empty) {
            Repr::Empty => Repr::Array8(Slots::empty()),
            Repr::Array8(slots) => {
                log::trace!("promoting property table to {LARGE_CAPACITY} slots");
                Repr::Array16(slots.widen())
            }
            Repr::Array16(slots) => {
                log::trace!("promoting property table to a map");
                Repr::Map(Arc::new(slots.into_map()))
            }
            Repr::Map(map) => {
                self.repr = Repr::Map(map);
                return;
            }
        };
        self.repr = grown;
        self.owns_keys = true;
        self.owns_values = true;
        self.check_invariant();
    }
}

impl<V> Index<PropertyId> for PropertyTable<V> {
    type Output = V;

    /// Panics if the property is not set.
    #[track_caller]
    fn index(&self, id: PropertyId) -> &V {
        match self.get(id) {
            Some(value) => value,
            None => missing_property(id),
        }
    }
}

impl<V: PropertyValue> Extend<(PropertyId, V)> for PropertyTable<V> {
    fn extend<T: IntoIterator<Item = (PropertyId, V)>>(&mut self, iter: T) {
        for (id, value) in iter {
            self.set(id, value);
        }
    }
}

impl<V: PropertyValue> FromIterator<(PropertyId, V)> for PropertyTable<V> {
    fn from_iter<T: IntoIterator<Item = (PropertyId, V)>>(iter: T) -> Self {
        let mut table = Self::default();
        table.extend(iter);
        table
    }
}
