//! Equality discipline for stored property values.
use std::{rc::Rc, sync::Arc};

/// Values that can be stored in a [`PropertyTable`][crate::PropertyTable].
///
/// Tables clone values when a shared backing store has to be privatized before a write, so
/// cloning should be cheap. Values that are expensive to clone or that have identity are usually
/// stored behind an [`Arc`] or as an index into some arena.
pub trait PropertyValue: Clone {
    /// Returns `true` if replacing `self` with `other` would not be observable.
    ///
    /// This is used by [`set`][crate::PropertyTable::set] to skip redundant writes, which avoids
    /// privatizing a shared backing store, and by [`try_add`][crate::PropertyTable::try_add] to
    /// decide whether an already present value counts as equal. Implementations compare by
    /// identity first where values have identity and fall back to equality.
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! impl_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PropertyValue for $ty {
                #[inline(always)]
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_by_eq!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
    &'static str,
);

impl PropertyValue for f32 {
    #[inline(always)]
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl PropertyValue for f64 {
    #[inline(always)]
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: PartialEq + ?Sized> PropertyValue for Arc<T> {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other) || **self == **other
    }
}

impl<T: PartialEq + ?Sized> PropertyValue for Rc<T> {
    #[inline]
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other) || **self == **other
    }
}
