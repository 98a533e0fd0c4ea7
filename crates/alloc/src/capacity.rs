//! Growth policies.
//!
//! Appending grows by doubling, which keeps `push` amortized O(1). Writing past the end grows
//! through a [`RoundUp`] function chosen at construction, so repeated inserts at increasing
//! indices land on a few "nice" capacities instead of reallocating every time.

use crate::size::Size;

/// Maps a required capacity `x` to the capacity to allocate.
///
/// Implementations must return a value `>= x`. Returning `0` for `0` is expected.
pub type RoundUp<S> = fn(S) -> S;

/// Returns the capacity to grow to when appending to a full buffer of `cap` slots.
///
/// Returns `None` if doubling overflows `S`.
#[inline]
pub fn doubled<S: Size>(cap: S) -> Option<S> {
    if cap.is_zero() {
        Some(S::one() + S::one())
    } else {
        cap.checked_add(&cap)
    }
}

/// Returns the smallest power of two `>= x`, or `0` for `0`.
///
/// If that power of two does not fit in `S`, returns `x` unchanged.
pub fn next_power_of_two<S: Size>(x: S) -> S {
    if x.is_zero() {
        return S::zero();
    }
    let mut y = S::one();
    while y < x {
        match y.checked_add(&y) {
            Some(next) => y = next,
            None => return x,
        }
    }
    y
}

/// Same result as [`next_power_of_two`], computed by smearing the highest set bit.
pub fn smear<S: Size>(x: S) -> S {
    if x.is_zero() {
        return S::zero();
    }
    let bits = S::zero().count_zeros() as usize;
    let mut y = x - S::one();
    let mut shift = 1;
    while shift < bits {
        y = y | (y >> shift);
        shift <<= 1;
    }
    y.checked_add(&S::one()).unwrap_or(x)
}

/// Allocates exactly what was asked for.
#[inline]
pub fn exact<S: Size>(x: S) -> S {
    x
}
