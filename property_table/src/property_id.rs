//! Packed property identifiers.
use core::fmt;

/// Identifies a single property slot of a [`PropertyTable`][crate::PropertyTable].
///
/// A property id is composed of a 16-bit group id and a 16-bit member id, packed into a single
/// `u32` as `group_id << 16 | member_id`. Group id `0` is used for ordinary properties, non-zero
/// group ids identify a [property group][crate::PropertyGroup] whose members are enumerated
/// together.
///
/// The all-zero value, [`PropertyId::ZERO`], is reserved as the sentinel for unused slots. Every
/// property that can be stored in a table has a non-zero member id, which guarantees it is distinct
/// from the sentinel.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PropertyId(u32);

impl PropertyId {
    /// The sentinel marking an unused slot.
    pub const ZERO: Self = Self(0);

    const GROUP_SHIFT: u32 = 16;
    const MEMBER_MASK: u32 = (1 << Self::GROUP_SHIFT) - 1;

    /// Packs a group id and a member id into a property id.
    ///
    /// This is injective. For a non-zero `member_id` the result is never [`PropertyId::ZERO`].
    #[inline(always)]
    pub const fn pack(group_id: u16, member_id: u16) -> Self {
        Self((group_id as u32) << Self::GROUP_SHIFT | member_id as u32)
    }

    /// Returns the `(group_id, member_id)` pair this id was packed from.
    #[inline(always)]
    pub const fn unpack(self) -> (u16, u16) {
        (self.group_id(), self.member_id())
    }

    /// Reconstructs a property id from its raw packed representation.
    #[inline(always)]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw packed representation.
    #[inline(always)]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the id of the property group, `0` for ordinary properties.
    #[inline(always)]
    pub const fn group_id(self) -> u16 {
        (self.0 >> Self::GROUP_SHIFT) as u16
    }

    /// Returns the member id.
    #[inline(always)]
    pub const fn member_id(self) -> u16 {
        (self.0 & Self::MEMBER_MASK) as u16
    }

    /// Returns `true` for the unused slot sentinel.
    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if this id is a member of the given non-zero property group.
    ///
    /// No property id is a member of group `0`.
    #[inline(always)]
    pub const fn is_in_group(self, group_id: u16) -> bool {
        group_id != 0 && self.group_id() == group_id
    }

    /// Returns `true` if this id belongs to any property group.
    #[inline(always)]
    pub const fn is_group_member(self) -> bool {
        self.group_id() != 0
    }

    /// Returns `true` if this id may be stored in a table, i.e. has a non-zero member id.
    #[inline(always)]
    pub const fn is_assignable(self) -> bool {
        self.member_id() != 0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({self})")
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id(), self.member_id())
    }
}

#[cfg(test)]
mod tests {
    use super::PropertyId;

    #[test]
    fn pack_unpack() {
        let id = PropertyId::pack(3, 17);
        assert_eq!(id.unpack(), (3, 17));
        assert_eq!(id.raw(), 3 << 16 | 17);
        assert_eq!(PropertyId::from_raw(id.raw()), id);
        assert!(id.is_in_group(3));
        assert!(!id.is_in_group(4));
        assert!(id.is_group_member());
        assert_eq!(format!("{id:?}"), "PropertyId(3:17)");
    }

    #[test]
    fn zero_sentinel() {
        assert!(PropertyId::ZERO.is_zero());
        assert!(!PropertyId::ZERO.is_assignable());
        assert!(!PropertyId::pack(0, 1).is_zero());
        assert!(!PropertyId::pack(5, 0).is_assignable());
        assert!(!PropertyId::pack(0, 9).is_in_group(0));
        assert!(!PropertyId::ZERO.is_in_group(0));
    }
}
