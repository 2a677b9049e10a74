use thiserror::Error;

/// Errors reported while declaring properties and property groups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A property with the same owner and name was already declared.
    #[error("property {owner}.{name} is already declared")]
    DuplicateProperty {
        /// Owner of the conflicting declaration.
        owner: String,
        /// Name of the conflicting declaration.
        name: String,
    },

    /// A property group with the same owner and prefix was already declared.
    #[error("property group {owner}.{prefix}* is already declared")]
    DuplicateGroup {
        /// Owner of the conflicting declaration.
        owner: String,
        /// Prefix of the conflicting declaration.
        prefix: String,
    },

    /// No property group with the given id was declared.
    #[error("property group {0} is not declared")]
    UnknownGroup(u16),

    /// All member ids of the ungrouped properties are in use.
    #[error("cannot declare more than {} ungrouped properties", u16::MAX)]
    TooManyProperties,

    /// All group ids are in use.
    #[error("cannot declare more than {} property groups", u16::MAX)]
    TooManyGroups,

    /// All member ids of a property group are in use.
    #[error("property group {0} cannot hold more than {max} members", max = u16::MAX)]
    TooManyMembers(u16),

    /// A registry was already installed as the process-wide registry.
    #[error("a process-wide property registry is already installed")]
    AlreadyInstalled,
}
