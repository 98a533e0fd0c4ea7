use core::fmt::Debug;

use num_traits::{PrimInt, Unsigned};

/// An unsigned integer type used to count elements and slots.
///
/// Narrower types shrink the container's header at the cost of a lower maximum length.
/// Growth past `Self::max_value()` is reported as an error instead of wrapping.
pub trait Size: PrimInt + Unsigned + Debug {
    /// Converts from `usize`, truncating values that do not fit.
    fn from_usize(n: usize) -> Self;
    fn to_usize(self) -> usize;
}

macro_rules! impl_size {
    ($ty:ty) => {
        impl Size for $ty {
            #[inline]
            fn from_usize(n: usize) -> Self {
                n as Self
            }

            #[inline]
            fn to_usize(self) -> usize {
                self as usize
            }
        }
    };
}

impl_size!(usize);
impl_size!(u8);
impl_size!(u16);
#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl_size!(u32);
#[cfg(target_pointer_width = "64")]
impl_size!(u64);
