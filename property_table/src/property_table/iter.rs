use core::fmt;
use std::iter::FusedIterator;

use crate::{slots, PropertyId};

use super::{PropertyTable, Repr};

/// Iterator over the set properties of a [`PropertyTable`].
///
/// The iteration order is unspecified. Calling [`PropertyTable::iter`] again restarts the
/// enumeration.
pub struct Iter<'a, V> {
    inner: IterInner<'a, V>,
}

type SlotIter<'a, V> =
    std::iter::Zip<std::slice::Iter<'a, PropertyId>, std::slice::Iter<'a, Option<V>>>;

enum IterInner<'a, V> {
    Slots(SlotIter<'a, V>),
    Map(hashbrown::hash_map::Iter<'a, PropertyId, V>),
}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Self {
            inner: match &self.inner {
                IterInner::Slots(iter) => IterInner::Slots(iter.clone()),
                IterInner::Map(iter) => IterInner::Map(iter.clone()),
            },
        }
    }
}

impl<V> Default for Iter<'_, V> {
    fn default() -> Self {
        Self {
            inner: IterInner::Slots(
                <&[PropertyId]>::default()
                    .iter()
                    .zip(<&[Option<V>]>::default()),
            ),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Iter<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (PropertyId, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Slots(iter) => iter.find_map(|(&key, value)| match (key.is_zero(), value) {
                (false, Some(value)) => Some((key, value)),
                _ => None,
            }),
            IterInner::Map(iter) => iter.next().map(|(&key, value)| (key, value)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterInner::Slots(iter) => (0, iter.size_hint().1),
            IterInner::Map(iter) => iter.size_hint(),
        }
    }
}

impl<V> FusedIterator for Iter<'_, V> {}

/// Iterator over the set members of one property group of a [`PropertyTable`].
///
/// For the array representations, the slots belonging to the group are determined once when the
/// iterator is created and stored as a bitmap.
pub struct GroupIter<'a, V> {
    inner: GroupIterInner<'a, V>,
}

enum GroupIterInner<'a, V> {
    Slots {
        keys: &'a [PropertyId],
        values: &'a [Option<V>],
        bitmap: u16,
    },
    Map {
        iter: hashbrown::hash_map::Iter<'a, PropertyId, V>,
        group_id: u16,
    },
}

impl<V> Clone for GroupIter<'_, V> {
    fn clone(&self) -> Self {
        Self {
            inner: match &self.inner {
                &GroupIterInner::Slots {
                    keys,
                    values,
                    bitmap,
                } => GroupIterInner::Slots {
                    keys,
                    values,
                    bitmap,
                },
                GroupIterInner::Map { iter, group_id } => GroupIterInner::Map {
                    iter: iter.clone(),
                    group_id: *group_id,
                },
            },
        }
    }
}

impl<V> Default for GroupIter<'_, V> {
    fn default() -> Self {
        Self {
            inner: GroupIterInner::Slots {
                keys: &[],
                values: &[],
                bitmap: 0,
            },
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for GroupIter<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, V> Iterator for GroupIter<'a, V> {
    type Item = (PropertyId, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            GroupIterInner::Slots {
                keys,
                values,
                bitmap,
            } => {
                let (keys, values) = (*keys, *values);
                while *bitmap != 0 {
                    let slot = bitmap.trailing_zeros() as usize;
                    *bitmap &= *bitmap - 1;
                    if let (Some(&key), Some(Some(value))) = (keys.get(slot), values.get(slot)) {
                        return Some((key, value));
                    }
                }
                None
            }
            GroupIterInner::Map { iter, group_id } => {
                let group_id = *group_id;
                iter.find(|(key, _)| key.is_in_group(group_id))
                    .map(|(&key, value)| (key, value))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            GroupIterInner::Slots { bitmap, .. } => (0, Some(bitmap.count_ones() as usize)),
            GroupIterInner::Map { iter, .. } => (0, iter.size_hint().1),
        }
    }
}

impl<V> FusedIterator for GroupIter<'_, V> {}

/// The members of one property group within a [`PropertyTable`].
///
/// Returned by [`PropertyTable::group`]. Each call to [`iter`][Self::iter] or `into_iter`
/// enumerates the group from the start.
pub struct PropertyGroup<'a, V> {
    table: &'a PropertyTable<V>,
    group_id: u16,
}

impl<V> Clone for PropertyGroup<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for PropertyGroup<'_, V> {}

impl<V: fmt::Debug> fmt::Debug for PropertyGroup<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, V> PropertyGroup<'a, V> {
    /// Returns the id of the property group.
    pub fn group_id(&self) -> u16 {
        self.group_id
    }

    /// Returns the number of set members.
    pub fn len(&self) -> usize {
        self.table.count_group(self.group_id)
    }

    /// Returns `true` if no member of the group is set.
    pub fn is_empty(&self) -> bool {
        !self.table.contains_group(self.group_id)
    }

    /// Returns the value of the group member with the given member id.
    pub fn get(&self, member_id: u16) -> Option<&'a V> {
        self.table.get(PropertyId::pack(self.group_id, member_id))
    }

    /// Enumerates the set members of the group.
    pub fn iter(&self) -> GroupIter<'a, V> {
        self.table.iter_group(self.group_id)
    }
}

impl<'a, V> IntoIterator for PropertyGroup<'a, V> {
    type Item = (PropertyId, &'a V);
    type IntoIter = GroupIter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V> PropertyTable<V> {
    /// Enumerates all set properties in unspecified order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            inner: match &self.repr {
                Repr::Array8(slots) => {
                    IterInner::Slots(slots.keys.iter().zip(slots.values.iter()))
                }
                Repr::Array16(slots) => {
                    IterInner::Slots(slots.keys.iter().zip(slots.values.iter()))
                }
                Repr::Map(map) => IterInner::Map(map.iter()),
                Repr::Empty => return Iter::default(),
            },
        }
    }

    /// Enumerates the set members of one property group in unspecified order.
    ///
    /// Nothing is enumerated for group `0`.
    pub fn iter_group(&self, group_id: u16) -> GroupIter<'_, V> {
        GroupIter {
            inner: match &self.repr {
                Repr::Array8(slots) => GroupIterInner::Slots {
                    keys: &slots.keys[..],
                    values: &slots.values[..],
                    bitmap: slots::group_bitmap(&slots.keys, group_id),
                },
                Repr::Array16(slots) => GroupIterInner::Slots {
                    keys: &slots.keys[..],
                    values: &slots.values[..],
                    bitmap: slots::group_bitmap(&slots.keys, group_id),
                },
                Repr::Map(map) if group_id != 0 => GroupIterInner::Map {
                    iter: map.iter(),
                    group_id,
                },
                Repr::Map(_) | Repr::Empty => return GroupIter::default(),
            },
        }
    }

    /// Returns a view of the members of one property group.
    pub fn group(&self, group_id: u16) -> PropertyGroup<'_, V> {
        PropertyGroup {
            table: self,
            group_id,
        }
    }
}

impl<'a, V> IntoIterator for &'a PropertyTable<V> {
    type Item = (PropertyId, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
