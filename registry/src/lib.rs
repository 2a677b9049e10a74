//! Declarations of properties and property groups.
//!
//! Every property a tree node can carry is declared once, by an owner (usually a control type) and
//! a name, and is interned into a [`PropertyId`]. Ungrouped properties use group id `0` and get
//! consecutive member ids. A property group, such as the free-form HTML attributes of a control,
//! gets its own group id and interns its members on demand.
//!
//! Declarations are collected with a [`RegistryBuilder`] and frozen into a [`Registry`], which can
//! be installed as the process-wide registry.
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]
#![warn(missing_docs)]

use std::{
    fmt,
    hash::{BuildHasher, BuildHasherDefault, Hash},
    ops::Deref,
    sync::{Arc, OnceLock},
};

use hashbrown::{hash_table::Entry, HashTable};
use property_table::PropertyId;
use zwohash::ZwoHasher;

mod error;

pub use error::RegistryError;

fn hash_name(scope: impl Hash, name: &str) -> u64 {
    BuildHasherDefault::<ZwoHasher>::default().hash_one((scope, name))
}

/// Maps a non-zero id to its position in a declaration vector.
fn slot(id: u16) -> Option<usize> {
    id.checked_sub(1).map(usize::from)
}

/// A declared property.
#[derive(Clone, Debug)]
pub struct PropertyDeclaration {
    id: PropertyId,
    owner: Arc<str>,
    name: Arc<str>,
    group_prefix: Option<Arc<str>>,
}

impl PropertyDeclaration {
    /// Returns the interned id of the property.
    pub fn id(&self) -> PropertyId {
        self.id
    }

    /// Returns the owner that declared the property or its group.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the name of the property, without the group prefix for group members.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the prefix of the property group for group members.
    pub fn group_prefix(&self) -> Option<&str> {
        self.group_prefix.as_deref()
    }
}

impl fmt::Display for PropertyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.group_prefix.as_deref().unwrap_or_default();
        write!(f, "{}.{prefix}{}", self.owner, self.name)
    }
}

/// A declared property group and its members.
#[derive(Clone, Debug)]
pub struct GroupDeclaration {
    group_id: u16,
    owner: Arc<str>,
    prefix: Arc<str>,
    members: Vec<PropertyDeclaration>,
    member_index: HashTable<u16>,
}

impl GroupDeclaration {
    /// Returns the group id shared by all members.
    pub fn group_id(&self) -> u16 {
        self.group_id
    }

    /// Returns the owner that declared the group.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Returns the prefix common to the names of all members.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the declared members in declaration order.
    pub fn members(&self) -> &[PropertyDeclaration] {
        &self.members
    }

    /// Returns the id of the member with the given name, if declared.
    pub fn member(&self, name: &str) -> Option<PropertyId> {
        let &member_id = self.member_index.find(hash_name((), name), |&member_id| {
            slot(member_id).is_some_and(|slot| &*self.members[slot].name == name)
        })?;
        Some(PropertyId::pack(self.group_id, member_id))
    }

    fn intern_member(&mut self, name: &str) -> Result<PropertyId, RegistryError> {
        let members = &self.members;
        let entry = self.member_index.entry(
            hash_name((), name),
            |&member_id| slot(member_id).is_some_and(|slot| &*members[slot].name == name),
            |&member_id| match slot(member_id) {
                Some(slot) => hash_name((), &members[slot].name),
                None => 0,
            },
        );
        let entry = match entry {
            Entry::Occupied(entry) => return Ok(PropertyId::pack(self.group_id, *entry.get())),
            Entry::Vacant(entry) => entry,
        };

        let member_id = u16::try_from(self.members.len() + 1)
            .map_err(|_| RegistryError::TooManyMembers(self.group_id))?;
        entry.insert(member_id);

        let declaration = PropertyDeclaration {
            id: PropertyId::pack(self.group_id, member_id),
            owner: self.owner.clone(),
            name: name.into(),
            group_prefix: Some(self.prefix.clone()),
        };
        log::debug!("declared group member {declaration} as {}", declaration.id);
        self.members.push(declaration);
        Ok(PropertyId::pack(self.group_id, member_id))
    }
}

/// The frozen set of declared properties and property groups.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    properties: Vec<PropertyDeclaration>,
    property_index: HashTable<u16>,
    groups: Vec<GroupDeclaration>,
    group_index: HashTable<u16>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Returns the declaration of a property or group member.
    pub fn property(&self, id: PropertyId) -> Option<&PropertyDeclaration> {
        let (group_id, member_id) = id.unpack();
        let slot = slot(member_id)?;
        if group_id == 0 {
            self.properties.get(slot)
        } else {
            self.group(group_id)?.members.get(slot)
        }
    }

    /// Returns the id of the ungrouped property with the given owner and name.
    pub fn find(&self, owner: &str, name: &str) -> Option<PropertyId> {
        let &member_id = self
            .property_index
            .find(hash_name(owner, name), |&member_id| {
                slot(member_id).is_some_and(|slot| {
                    let declaration = &self.properties[slot];
                    &*declaration.owner == owner && &*declaration.name == name
                })
            })?;
        Some(PropertyId::pack(0, member_id))
    }

    /// Returns the declaration of a property group.
    pub fn group(&self, group_id: u16) -> Option<&GroupDeclaration> {
        self.groups.get(slot(group_id)?)
    }

    /// Returns the id of the property group with the given owner and prefix.
    pub fn find_group(&self, owner: &str, prefix: &str) -> Option<u16> {
        self.group_index
            .find(hash_name(owner, prefix), |&group_id| {
                slot(group_id).is_some_and(|slot| {
                    let group = &self.groups[slot];
                    &*group.owner == owner && &*group.prefix == prefix
                })
            })
            .copied()
    }

    /// Returns the ungrouped properties in declaration order.
    pub fn properties(&self) -> &[PropertyDeclaration] {
        &self.properties
    }

    /// Returns the property groups in declaration order.
    pub fn groups(&self) -> &[GroupDeclaration] {
        &self.groups
    }

    /// Installs this registry as the process-wide registry.
    pub fn install(self) -> Result<&'static Registry, RegistryError> {
        let mut installed_now = false;
        let installed = GLOBAL.get_or_init(|| {
            installed_now = true;
            self
        });
        if !installed_now {
            return Err(RegistryError::AlreadyInstalled);
        }
        log::info!(
            "installed property registry with {} properties and {} groups",
            installed.properties.len(),
            installed.groups.len()
        );
        Ok(installed)
    }

    /// Returns the process-wide registry, if one was installed.
    pub fn global() -> Option<&'static Registry> {
        GLOBAL.get()
    }
}

/// Collects property and group declarations.
///
/// This implements [`Deref<Target=Registry>`][`Deref`] so that all lookups work while declaring.
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl Deref for RegistryBuilder {
    type Target = Registry;

    fn deref(&self) -> &Self::Target {
        &self.registry
    }
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an ungrouped property and returns its interned id.
    ///
    /// Fails if the owner already declared a property with the same name.
    pub fn declare_property(&mut self, owner: &str, name: &str) -> Result<PropertyId, RegistryError> {
        let registry = &mut self.registry;
        let properties = &registry.properties;
        let entry = registry.property_index.entry(
            hash_name(owner, name),
            |&member_id| {
                slot(member_id).is_some_and(|slot| {
                    let declaration = &properties[slot];
                    &*declaration.owner == owner && &*declaration.name == name
                })
            },
            |&member_id| match slot(member_id) {
                Some(slot) => hash_name(&*properties[slot].owner, &properties[slot].name),
                None => 0,
            },
        );
        let Entry::Vacant(entry) = entry else {
            return Err(RegistryError::DuplicateProperty {
                owner: owner.to_owned(),
                name: name.to_owned(),
            });
        };

        let member_id = u16::try_from(registry.properties.len() + 1)
            .map_err(|_| RegistryError::TooManyProperties)?;
        entry.insert(member_id);

        let declaration = PropertyDeclaration {
            id: PropertyId::pack(0, member_id),
            owner: owner.into(),
            name: name.into(),
            group_prefix: None,
        };
        log::debug!("declared property {declaration} as {}", declaration.id);
        registry.properties.push(declaration);
        Ok(PropertyId::pack(0, member_id))
    }

    /// Declares a property group and returns its group id.
    ///
    /// Fails if the owner already declared a group with the same prefix.
    pub fn declare_group(&mut self, owner: &str, prefix: &str) -> Result<u16, RegistryError> {
        let registry = &mut self.registry;
        let groups = &registry.groups;
        let entry = registry.group_index.entry(
            hash_name(owner, prefix),
            |&group_id| {
                slot(group_id).is_some_and(|slot| {
                    let group = &groups[slot];
                    &*group.owner == owner && &*group.prefix == prefix
                })
            },
            |&group_id| match slot(group_id) {
                Some(slot) => hash_name(&*groups[slot].owner, &groups[slot].prefix),
                None => 0,
            },
        );
        let Entry::Vacant(entry) = entry else {
            return Err(RegistryError::DuplicateGroup {
                owner: owner.to_owned(),
                prefix: prefix.to_owned(),
            });
        };

        let group_id =
            u16::try_from(registry.groups.len() + 1).map_err(|_| RegistryError::TooManyGroups)?;
        entry.insert(group_id);

        log::debug!("declared property group {owner}.{prefix}* as group {group_id}");
        registry.groups.push(GroupDeclaration {
            group_id,
            owner: owner.into(),
            prefix: prefix.into(),
            members: vec![],
            member_index: HashTable::new(),
        });
        Ok(group_id)
    }

    /// Returns the id of a member of a property group, declaring it on first use.
    pub fn declare_group_member(
        &mut self,
        group_id: u16,
        name: &str,
    ) -> Result<PropertyId, RegistryError> {
        let group = slot(group_id)
            .and_then(|slot| self.registry.groups.get_mut(slot))
            .ok_or(RegistryError::UnknownGroup(group_id))?;
        group.intern_member(name)
    }

    /// Freezes the declarations.
    pub fn build(self) -> Registry {
        self.registry
    }
}
