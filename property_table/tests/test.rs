#![allow(missing_docs)] // test only
use std::{
    fmt::Debug,
    hash::BuildHasherDefault,
    sync::{Arc, Mutex},
};

use hashbrown::{hash_map::Entry, HashMap};
use property_table::{PropertyId, PropertyMap, PropertyTable, PropertyValue, TableState};
use rand::prelude::*;
use zwohash::ZwoHasher;

type ModelMap<V> = HashMap<PropertyId, V, BuildHasherDefault<ZwoHasher>>;

fn id(member: u16) -> PropertyId {
    PropertyId::pack(0, member)
}

/// A property table checked against a plain hash map after every operation.
pub struct TestPropertyTable<V> {
    under_test: PropertyTable<V>,
    model: ModelMap<V>,
}

impl<V> Default for TestPropertyTable<V> {
    fn default() -> Self {
        Self {
            under_test: Default::default(),
            model: Default::default(),
        }
    }
}

impl<V: PropertyValue + PartialEq + Debug> TestPropertyTable<V> {
    pub fn set(&mut self, id: PropertyId, value: V) {
        self.model.insert(id, value.clone());
        self.under_test.set(id, value);
    }

    pub fn try_add(&mut self, id: PropertyId, value: V) -> bool {
        let expected = match self.model.entry(id) {
            Entry::Occupied(entry) => entry.get().same_value(&value),
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
                true
            }
        };
        let added = self.under_test.try_add(id, value);
        assert_eq!(added, expected);
        added
    }

    pub fn remove(&mut self, id: PropertyId) -> bool {
        let expected = self.model.remove(&id).is_some();
        let removed = self.under_test.remove(id);
        assert_eq!(removed, expected);
        removed
    }

    pub fn get(&self, id: PropertyId) -> Option<&V> {
        let found = self.under_test.get(id);
        assert_eq!(found, self.model.get(&id));
        assert_eq!(self.under_test.contains(id), found.is_some());
        found
    }

    pub fn clone_shared(&mut self) -> Self {
        Self {
            under_test: self.under_test.clone_shared(),
            model: self.model.clone(),
        }
    }

    pub fn check(&self, groups: std::ops::Range<u16>) {
        self.under_test.check();
        assert_eq!(self.under_test.len(), self.model.len());
        assert_eq!(self.under_test.is_empty(), self.model.is_empty());

        let mut seen = ModelMap::default();
        for (key, value) in &self.under_test {
            assert_eq!(self.model.get(&key), Some(value));
            assert!(seen.insert(key, ()).is_none(), "{key:?} enumerated twice");
        }
        assert_eq!(seen.len(), self.model.len());

        for group_id in groups {
            let mut expected: Vec<_> = self
                .model
                .iter()
                .filter(|(key, _)| key.is_in_group(group_id))
                .map(|(&key, value)| (key, value))
                .collect();
            let mut found: Vec<_> = self.under_test.iter_group(group_id).collect();
            expected.sort_by_key(|&(key, _)| key);
            found.sort_by_key(|&(key, _)| key);
            assert_eq!(found, expected);
            assert_eq!(self.under_test.count_group(group_id), expected.len());
            assert_eq!(self.under_test.contains_group(group_id), !expected.is_empty());
            assert_eq!(self.under_test.group(group_id).len(), expected.len());
        }
    }
}

macro_rules! weighted_choose {
    ($rng:expr, $($name:ident: $weight:expr => $body:expr),+) => {
        {
            enum Branches { $( $name,  )* }
            let weights = [$((Branches::$name, $weight)),+];
            match weights.choose_weighted($rng, |x| x.1).unwrap().0 {
                $(Branches::$name => $body),*
            }
        }
    }
}

fn random_id(rng: &mut impl Rng, members: u16) -> PropertyId {
    PropertyId::pack(rng.gen_range(0..3), rng.gen_range(1..=members))
}

fn test_suite(seed: u64, members: u16) {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(seed);
    let mut tables: Vec<TestPropertyTable<u8>> = vec![Default::default()];
    let mut max_len = 0;

    for _ in 0..20000 {
        let index = rng.gen_range(0..tables.len());
        weighted_choose! {&mut rng,
            Set: 3.0 => {
                let key = random_id(&mut rng, members);
                let value = rng.gen_range(0..4);
                tables[index].set(key, value);
            },
            TryAdd: 1.0 => {
                let key = random_id(&mut rng, members);
                let value = rng.gen_range(0..4);
                tables[index].try_add(key, value);
            },
            Remove: 1.5 => {
                let key = random_id(&mut rng, members);
                tables[index].remove(key);
            },
            Get: 1.0 => {
                let key = random_id(&mut rng, members);
                tables[index].get(key);
            },
            Clone: 0.1 => {
                let clone = tables[index].clone_shared();
                if tables.len() < 6 {
                    tables.push(clone);
                } else {
                    tables[(index + 1) % 6] = clone;
                }
            },
            Clear: 0.01 => {
                tables[index].under_test.clear();
                tables[index].model.clear();
            },
            Check: 0.2 => {
                tables[index].check(0..4);
            }
        };
        max_len = max_len.max(tables[index].model.len());
    }

    for table in &tables {
        table.check(0..4);
    }
    println!("max len {max_len}");
}

#[test]
fn test_suite_small() {
    test_suite(1, 6);
}

#[test]
fn test_suite_promoting() {
    test_suite(2, 12);
}

#[test]
fn test_suite_large() {
    test_suite(3, 40);
}

#[test]
fn empty_to_array8_to_array16() {
    let mut table = PropertyTable::default();
    assert_eq!(table.state(), TableState::Empty);

    table.set(id(1), "x");
    assert_eq!(table.state(), TableState::Array8);
    assert_eq!(table.len(), 1);

    for member in 2..=8 {
        table.set(id(member), "y");
    }
    assert_eq!(table.state(), TableState::Array8);
    assert_eq!(table.len(), 8);

    table.set(id(9), "z");
    assert_eq!(table.state(), TableState::Array16);
    assert_eq!(table.len(), 9);
    assert_eq!(table.get(id(1)), Some(&"x"));
    for member in 2..=8 {
        assert_eq!(table.get(id(member)), Some(&"y"));
    }
    assert_eq!(table.get(id(9)), Some(&"z"));
}

#[test]
fn promotion_to_map_keeps_all_entries() {
    let mut table = PropertyTable::default();
    for member in 1..=16 {
        table.set(id(member), member as u32);
    }
    assert_eq!(table.state(), TableState::Array16);

    table.set(id(17), 17);
    assert_eq!(table.state(), TableState::Map);
    assert_eq!(table.len(), 17);

    for member in 1..=17 {
        assert_eq!(table.get(id(member)), Some(&(member as u32)));
    }
    let mut enumerated: Vec<_> = table.iter().map(|(key, &value)| (key, value)).collect();
    enumerated.sort();
    assert_eq!(
        enumerated,
        (1..=17).map(|member| (id(member), member as u32)).collect::<Vec<_>>()
    );
}

#[test]
fn removed_slots_are_reused() {
    let mut table = PropertyTable::default();
    for member in 1..=8 {
        table.set(id(member), member);
    }
    assert!(table.remove(id(3)));
    assert!(!table.remove(id(3)));
    table.set(id(20), 20);
    assert_eq!(table.state(), TableState::Array8);
    assert_eq!(table.len(), 8);
    assert_eq!(table.get(id(3)), None);
}

#[test]
fn count_after_remove() {
    let mut table = PropertyTable::default();
    table.set(id(1), 1);
    table.set(id(2), 2);
    table.remove(id(1));
    assert_eq!(table.len(), 1);
}

#[test]
fn try_add_is_idempotent() {
    let mut table = PropertyTable::default();
    assert!(table.try_add(id(1), 5));
    assert!(table.try_add(id(1), 5));
    assert_eq!(table.len(), 1);
    assert!(!table.try_add(id(1), 6));
    assert_eq!(table[id(1)], 5);
}

#[test]
fn try_add_uses_value_equality_for_shared_pointers() {
    let mut table = PropertyTable::default();
    let a: Arc<str> = "text".into();
    let b: Arc<str> = "text".into();
    assert!(table.try_add(id(1), a));
    assert!(table.try_add(id(1), b));
    assert!(!table.try_add(id(1), "other".into()));
}

#[test]
fn clones_are_independent() {
    let mut table = PropertyTable::default();
    table.set(id(1), 1);
    let mut clone = table.clone_shared();
    table.set(id(1), 2);
    assert_eq!(clone.get(id(1)), Some(&1));

    clone.set(id(2), 3);
    assert!(!table.contains(id(2)));
    assert_eq!(table.len(), 1);
    assert_eq!(clone.len(), 2);
}

#[test]
fn clones_of_clones_are_independent() {
    let mut table = PropertyTable::default();
    for member in 1..=20 {
        table.set(id(member), member);
    }
    let mut first = table.clone_shared();
    let mut second = first.clone_shared();

    table.remove(id(1));
    first.set(id(2), 200);
    second.set(id(21), 21);

    assert_eq!(table.len(), 19);
    assert_eq!(first.len(), 20);
    assert_eq!(second.len(), 21);
    assert_eq!(table.get(id(2)), Some(&2));
    assert_eq!(first.get(id(2)), Some(&200));
    assert_eq!(second.get(id(2)), Some(&2));
    assert_eq!(second.get(id(1)), Some(&1));
}

#[test]
fn cloning_compacts_small_maps() {
    let mut table = PropertyTable::default();
    for member in 1..=17 {
        table.set(id(member), member);
    }
    assert_eq!(table.state(), TableState::Map);

    let large = table.clone_shared();
    assert_eq!(large.state(), TableState::Map);
    assert_eq!(table.state(), TableState::Map);

    for member in 5..=17 {
        table.remove(id(member));
    }
    assert_eq!(table.state(), TableState::Map);

    let small = table.clone_shared();
    assert_eq!(table.state(), TableState::Array8);
    assert_eq!(small.state(), TableState::Array8);
    assert_eq!(small.len(), 4);
    for member in 1..=4 {
        assert_eq!(small[id(member)], member);
    }
    assert_eq!(large.len(), 17);

    let mut medium: PropertyTable<u16> = (1..=10).map(|member| (id(member), member)).collect();
    for member in 11..=17 {
        medium.set(id(member), member);
    }
    for member in 11..=17 {
        medium.remove(id(member));
    }
    let medium_clone = medium.clone_shared();
    assert_eq!(medium_clone.state(), TableState::Array16);
    assert_eq!(medium_clone.len(), 10);
}

#[derive(Clone, Debug)]
enum Content {
    Text(&'static str),
    Owned(Arc<Mutex<u32>>),
}

impl PropertyValue for Content {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Content::Text(a), Content::Text(b)) => a == b,
            (Content::Owned(a), Content::Owned(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn deep_clone(value: &Content) -> Option<Content> {
    match value {
        Content::Owned(inner) => Some(Content::Owned(Arc::new(Mutex::new(
            *inner.lock().unwrap() + 1000,
        )))),
        Content::Text(_) => None,
    }
}

#[test]
fn owned_values_are_deep_cloned() {
    for members in [3, 12, 30] {
        let mut table = PropertyTable::default();
        let owned = Arc::new(Mutex::new(7));
        table.set(id(1), Content::Owned(owned.clone()));
        for member in 2..=members {
            table.set(id(member), Content::Text("shared"));
        }

        let clone = table.clone_shared_with(deep_clone);

        let Some(Content::Owned(cloned)) = clone.get(id(1)) else {
            panic!("missing owned value");
        };
        assert!(!Arc::ptr_eq(cloned, &owned));
        assert_eq!(*cloned.lock().unwrap(), 1007);
        assert!(matches!(
            table.get(id(1)),
            Some(Content::Owned(original)) if Arc::ptr_eq(original, &owned)
        ));
        assert_eq!(clone.len(), table.len());
        assert!(matches!(clone.get(id(2)), Some(Content::Text("shared"))));
    }
}

#[test]
fn group_iteration_matches_filtered_iteration() {
    for count in [0u16, 3, 9, 20] {
        let mut table = PropertyTable::default();
        for member in 1..=count {
            table.set(PropertyId::pack(member % 3, member), member);
        }
        for group_id in 0..4 {
            let mut expected: Vec<_> = table
                .iter()
                .filter(|(key, _)| key.is_in_group(group_id))
                .collect();
            let mut found: Vec<_> = table.group(group_id).into_iter().collect();
            expected.sort_by_key(|&(key, _)| key);
            found.sort_by_key(|&(key, _)| key);
            assert_eq!(found, expected);
        }
        assert!(table.iter_group(0).next().is_none());
    }
}

#[test]
fn group_view_lookup() {
    let mut table = PropertyTable::default();
    table.set(PropertyId::pack(2, 1), "a");
    table.set(PropertyId::pack(2, 2), "b");
    table.set(PropertyId::pack(0, 1), "c");

    let group = table.group(2);
    assert_eq!(group.group_id(), 2);
    assert_eq!(group.len(), 2);
    assert!(!group.is_empty());
    assert_eq!(group.get(2), Some(&"b"));
    assert_eq!(group.get(3), None);
    assert_eq!(group.iter().count(), 2);
    assert_eq!(group.into_iter().count(), 2);
    assert!(table.group(3).is_empty());
}

#[test]
fn bulk_assignment_shares_stores() {
    let mut keys = [PropertyId::ZERO; 8];
    let mut values = [None; 8];
    keys[0] = id(1);
    values[0] = Some(10u32);
    keys[5] = id(2);
    values[5] = Some(20);
    let keys: Arc<[PropertyId]> = Arc::new(keys);
    let values: Arc<[Option<u32>]> = Arc::new(values);

    let mut tables: Vec<PropertyTable<u32>> = (0..4).map(|_| PropertyTable::default()).collect();
    for table in &mut tables {
        table.assign_bulk(keys.clone(), values.clone(), false, false);
        assert_eq!(table.state(), TableState::Array8);
        assert_eq!(table.len(), 2);
    }

    tables[0].set(id(3), 30);
    tables[1].set(id(1), 11);
    tables[2].remove(id(2));

    assert_eq!(tables[0].len(), 3);
    assert_eq!(tables[1][id(1)], 11);
    assert_eq!(tables[2].len(), 1);
    assert_eq!(tables[3][id(1)], 10);
    assert_eq!(tables[3].len(), 2);
    assert_eq!(values[0], Some(10));
    assert_eq!(keys[2], PropertyId::ZERO);
}

#[test]
fn bulk_assignment_into_populated_table() {
    let mut table = PropertyTable::default();
    table.set(id(7), 70u32);

    let mut keys = [PropertyId::ZERO; 16];
    let mut values = [None; 16];
    keys[3] = id(1);
    values[3] = Some(10);
    table.assign_bulk(Arc::new(keys), Arc::new(values), false, false);

    assert_eq!(table.state(), TableState::Array8);
    assert_eq!(table.len(), 2);
    assert_eq!(table[id(1)], 10);
    assert_eq!(table[id(7)], 70);
}

#[test]
#[should_panic(expected = "requires exactly 8 or 16 slots")]
fn bulk_assignment_rejects_other_lengths() {
    let mut table = PropertyTable::<u32>::default();
    let keys: Arc<[PropertyId]> = Arc::new([PropertyId::ZERO; 12]);
    let values: Arc<[Option<u32>]> = Arc::new([None; 12]);
    table.assign_bulk(keys, values, true, true);
}

#[test]
#[should_panic(expected = "bulk assignment with 8 keys but 16 values")]
fn bulk_assignment_rejects_mismatched_stores() {
    let mut table = PropertyTable::<u32>::default();
    let keys: Arc<[PropertyId]> = Arc::new([PropertyId::ZERO; 8]);
    let values: Arc<[Option<u32>]> = Arc::new([None; 16]);
    table.assign_bulk(keys, values, true, true);
}

#[test]
fn bulk_map_assignment() {
    let map: PropertyMap<u32> = (1..=20).map(|member| (id(member), member as u32)).collect();
    let map = Arc::new(map);

    let mut shared = PropertyTable::default();
    shared.assign_bulk_map(map.clone(), false);
    assert_eq!(shared.state(), TableState::Map);
    shared.set(id(1), 100);
    assert_eq!(map[&id(1)], 1);
    assert_eq!(shared[id(1)], 100);

    let mut merged = PropertyTable::default();
    merged.set(id(1), 1000);
    merged.set(id(30), 30);
    merged.assign_bulk_map(map.clone(), true);
    assert_eq!(merged.state(), TableState::Map);
    assert_eq!(merged.len(), 21);
    assert_eq!(merged[id(1)], 1);
    assert_eq!(merged[id(30)], 30);
    assert_eq!(map.len(), 20);

    let mut copied = PropertyTable::default();
    copied.set(id(40), 40);
    copied.assign_bulk_map(map.clone(), false);
    assert_eq!(copied.len(), 21);
    assert_eq!(copied[id(20)], 20);
}

#[test]
#[should_panic(expected = "cannot be stored in a property table")]
fn zero_member_id_is_rejected() {
    let mut table = PropertyTable::default();
    table.set(PropertyId::pack(3, 0), 1);
}

#[test]
#[should_panic(expected = "was not found")]
fn indexing_missing_property_panics() {
    let table = PropertyTable::<u32>::default();
    let _ = table[id(1)];
}

#[test]
fn same_value_writes_keep_stores_shared() {
    let mut table = PropertyTable::default();
    let text: Arc<str> = "text".into();
    table.set(id(1), text.clone());
    table.set(id(2), text.clone());
    let mut clone = table.clone_shared();
    assert_eq!(Arc::strong_count(&text), 3);

    // Copying either value store would add two references.
    clone.set(id(1), text.clone());
    table.set(id(2), text.clone());
    assert!(Arc::ptr_eq(&clone[id(1)], &text));
    assert_eq!(Arc::strong_count(&text), 3);

    clone.set(id(1), "other".into());
    assert!(table.remove(id(2)));
    assert_eq!(Arc::strong_count(&text), 3);

    assert_eq!(table.len(), 1);
    assert_eq!(&*table[id(1)], "text");
    assert!(!table.contains(id(2)));
    assert_eq!(clone.len(), 2);
    assert_eq!(&*clone[id(1)], "other");
    assert!(Arc::ptr_eq(&clone[id(2)], &text));
    assert_eq!(clone.state(), TableState::Array8);
    table.check();
    clone.check();
}

#[test]
fn clear_releases_everything() {
    let mut table: PropertyTable<u8> = (1..=30).map(|member| (id(member), 1)).collect();
    assert_eq!(table.state(), TableState::Map);
    table.clear();
    assert_eq!(table.state(), TableState::Empty);
    assert!(table.is_empty());
    assert_eq!(table.iter().count(), 0);
    table.set(id(1), 2);
    assert_eq!(table.state(), TableState::Array8);
}

#[test]
fn tables_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PropertyTable<Arc<str>>>();

    let table: PropertyTable<u32> = (1..=5).map(|member| (id(member), member as u32)).collect();
    std::thread::scope(|scope| {
        for _ in 0..2 {
            scope.spawn(|| assert_eq!(table.iter().count(), 5));
        }
    });
}

#[test]
fn debug_output_lists_entries() {
    let mut table = PropertyTable::default();
    table.set(PropertyId::pack(1, 2), 3);
    assert_eq!(format!("{table:?}"), "{PropertyId(1:2): 3}");
}
