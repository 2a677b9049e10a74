//! Linear search over the fixed-size key arrays used by the small table representations.
//!
//! All functions are generic over the array length `N`, which must be either [`SMALL_CAPACITY`] or
//! [`LARGE_CAPACITY`]; other lengths are rejected at compile time. Each search produces a bitmap
//! with bit `i` set when slot `i` matches, computed with SSE2 lane compares where available. For
//! at most 16 keys this is as fast as hashing and needs no bucket storage.
use crate::PropertyId;

/// Number of slots of the smaller array representation.
pub const SMALL_CAPACITY: usize = 8;
/// Number of slots of the larger array representation.
pub const LARGE_CAPACITY: usize = 16;

struct SupportedLen<const N: usize>;

impl<const N: usize> SupportedLen<N> {
    const CHECK: () = assert!(
        N == SMALL_CAPACITY || N == LARGE_CAPACITY,
        "slot arrays have either 8 or 16 entries"
    );
}

/// Result of [`find_slot_or_free`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotSearch {
    /// The key is present at the given slot.
    Existing(usize),
    /// The key is absent and the given slot is the first free one.
    Free(usize),
    /// The key is absent and there is no free slot left.
    Full,
}

#[cfg(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse2"
))]
#[inline(always)]
fn lane_bitmap<const N: usize, const GROUP: bool>(keys: &[PropertyId; N], needle: u32) -> u16 {
    #[cfg(target_arch = "x86")]
    use core::arch::x86;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64 as x86;

    #[allow(clippy::let_unit_value)]
    let () = SupportedLen::<N>::CHECK;

    let mut bitmap = 0u16;

    // SAFETY: sse2 is statically enabled for this target. `PropertyId` is a `repr(transparent)`
    // wrapper around `u32` and `N` is a multiple of 4, so every unaligned 16 byte load starts at a
    // key and stays within `keys`.
    unsafe {
        let needle = x86::_mm_set1_epi32(needle as i32);
        for chunk in 0..N / 4 {
            let mut lanes =
                x86::_mm_loadu_si128(keys.as_ptr().add(chunk * 4).cast::<x86::__m128i>());
            if GROUP {
                lanes = x86::_mm_srli_epi32::<16>(lanes);
            }
            let matches = x86::_mm_castsi128_ps(x86::_mm_cmpeq_epi32(lanes, needle));
            bitmap |= (x86::_mm_movemask_ps(matches) as u16) << (chunk * 4);
        }
    }

    bitmap
}

#[cfg(not(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    target_feature = "sse2"
)))]
#[inline(always)]
fn lane_bitmap<const N: usize, const GROUP: bool>(keys: &[PropertyId; N], needle: u32) -> u16 {
    #[allow(clippy::let_unit_value)]
    let () = SupportedLen::<N>::CHECK;

    let mut bitmap = 0u16;
    for (i, key) in keys.iter().enumerate() {
        let lane = if GROUP { key.raw() >> 16 } else { key.raw() };
        bitmap |= ((lane == needle) as u16) << i;
    }
    bitmap
}

/// Returns a bitmap of the slots containing exactly `target`.
#[inline(always)]
pub fn match_bitmap<const N: usize>(keys: &[PropertyId; N], target: PropertyId) -> u16 {
    lane_bitmap::<N, false>(keys, target.raw())
}

/// Returns a bitmap of the unused slots.
#[inline(always)]
pub fn free_bitmap<const N: usize>(keys: &[PropertyId; N]) -> u16 {
    match_bitmap(keys, PropertyId::ZERO)
}

/// Returns a bitmap of the slots holding members of the given property group.
///
/// This is always empty for group `0`.
#[inline(always)]
pub fn group_bitmap<const N: usize>(keys: &[PropertyId; N], group_id: u16) -> u16 {
    if group_id == 0 {
        return 0;
    }
    lane_bitmap::<N, true>(keys, group_id as u32)
}

/// Returns the slot containing `target`.
///
/// Never finds the [`PropertyId::ZERO`] sentinel.
#[inline(always)]
pub fn find_slot<const N: usize>(keys: &[PropertyId; N], target: PropertyId) -> Option<usize> {
    if target.is_zero() {
        return None;
    }
    let bitmap = match_bitmap(keys, target);
    (bitmap != 0).then(|| bitmap.trailing_zeros() as usize)
}

/// Returns `true` if `target` is present.
#[inline(always)]
pub fn contains_key<const N: usize>(keys: &[PropertyId; N], target: PropertyId) -> bool {
    find_slot(keys, target).is_some()
}

/// Finds the slot containing `target` or, if absent, the first free slot.
#[inline(always)]
pub fn find_slot_or_free<const N: usize>(keys: &[PropertyId; N], target: PropertyId) -> SlotSearch {
    debug_assert!(!target.is_zero());
    let found = match_bitmap(keys, target);
    if found != 0 {
        return SlotSearch::Existing(found.trailing_zeros() as usize);
    }
    let free = free_bitmap(keys);
    if free != 0 {
        SlotSearch::Free(free.trailing_zeros() as usize)
    } else {
        SlotSearch::Full
    }
}

/// Returns the number of used slots.
#[inline(always)]
pub fn count_live<const N: usize>(keys: &[PropertyId; N]) -> usize {
    N - free_bitmap(keys).count_ones() as usize
}

/// Returns the number of slots holding members of the given property group.
#[inline(always)]
pub fn count_group<const N: usize>(keys: &[PropertyId; N], group_id: u16) -> usize {
    group_bitmap(keys, group_id).count_ones() as usize
}

/// Returns `true` if any slot holds a member of the given property group.
#[inline(always)]
pub fn contains_group<const N: usize>(keys: &[PropertyId; N], group_id: u16) -> bool {
    group_bitmap(keys, group_id) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<const N: usize>(ids: &[(usize, PropertyId)]) -> [PropertyId; N] {
        let mut keys = [PropertyId::ZERO; N];
        for &(slot, id) in ids {
            keys[slot] = id;
        }
        keys
    }

    #[test]
    fn search_small() {
        let a = PropertyId::pack(0, 1);
        let b = PropertyId::pack(0, 2);
        let c = PropertyId::pack(0, 3);
        let keys = keys::<8>(&[(0, a), (2, b)]);

        assert_eq!(find_slot(&keys, a), Some(0));
        assert_eq!(find_slot(&keys, b), Some(2));
        assert_eq!(find_slot(&keys, c), None);
        assert_eq!(find_slot(&keys, PropertyId::ZERO), None);
        assert!(contains_key(&keys, b));

        assert_eq!(find_slot_or_free(&keys, b), SlotSearch::Existing(2));
        assert_eq!(find_slot_or_free(&keys, c), SlotSearch::Free(1));
        assert_eq!(count_live(&keys), 2);
    }

    #[test]
    fn search_full() {
        let keys: [PropertyId; 16] = std::array::from_fn(|i| PropertyId::pack(0, i as u16 + 1));
        assert_eq!(count_live(&keys), 16);
        assert_eq!(find_slot(&keys, PropertyId::pack(0, 16)), Some(15));
        assert_eq!(
            find_slot_or_free(&keys, PropertyId::pack(0, 17)),
            SlotSearch::Full
        );
        assert_eq!(
            find_slot_or_free(&keys, PropertyId::pack(0, 9)),
            SlotSearch::Existing(8)
        );
    }

    #[test]
    fn groups() {
        let keys = keys::<16>(&[
            (1, PropertyId::pack(4, 1)),
            (3, PropertyId::pack(0, 4)),
            (9, PropertyId::pack(4, 2)),
            (15, PropertyId::pack(5, 4)),
        ]);

        assert_eq!(group_bitmap(&keys, 4), 1 << 1 | 1 << 9);
        assert_eq!(group_bitmap(&keys, 5), 1 << 15);
        assert_eq!(group_bitmap(&keys, 0), 0);
        assert_eq!(count_group(&keys, 4), 2);
        assert!(contains_group(&keys, 5));
        assert!(!contains_group(&keys, 6));
    }
}
