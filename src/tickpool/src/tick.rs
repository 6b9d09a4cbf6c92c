//! Wraparound-safe tick arithmetic.
//!
//! The tick counter is a free-running unsigned value that wraps at its
//! maximum. Two ticks can still be ordered as long as they are less than half
//! the counter range apart: subtract in the counter's native width and
//! reinterpret the result as a signed value of the *same* width.
//!
//! Performing the subtraction directly in a wider signed type is wrong for
//! 16-bit counters: `1u16 - 65535u16` must come out as `2` ("expired 2 ms
//! ago"), not `-65534`. [`TickCount::diff`] is the sole primitive all expiry
//! comparisons go through.
use core::fmt;
use num_integer::Integer;
use num_traits::{PrimInt, Unsigned, WrappingAdd, WrappingSub};

use crate::utils::Init;

mod private {
    pub trait Sealed {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

/// A platform tick counter type: `u16` or `u32`.
///
/// Selected through [`Platform::Tick`](crate::Platform::Tick). This trait is
/// sealed; the two implementations cover the counter widths the wraparound
/// algorithm is defined for.
///
#[doc = svgbobdoc::transform!(
/// ```svgbob
///        expire             current
/// ─────────┬──────────────────┬──────────┬──────────→ "wraps to 0"
///          ^                  ^          ^
///          +---- "diff ≥ 0" --+     "Tick::MAX"
/// ```
)]
pub trait TickCount:
    PrimInt
    + Unsigned
    + WrappingAdd
    + WrappingSub
    + Init
    + fmt::Debug
    + private::Sealed
    + 'static
{
    /// The largest valid timer period, in ticks.
    ///
    /// Capped at `0x7fff_ffff` so that an expiry can always be ordered
    /// against the current tick by [`diff`](Self::diff).
    const MAX_PERIOD: u32;

    /// Signed difference `self - other`, computed in the counter's native
    /// width.
    ///
    /// `diff(a, b) >= 0` means `a` has reached or passed `b`, even when the
    /// counter wrapped in between.
    fn diff(self, other: Self) -> i32;

    /// Convert a validated period (`1..=MAX_PERIOD`) to the tick type.
    fn from_period(period: u32) -> Self;

    /// Modular (truncating) conversion from `u32`.
    fn wrapping_from_u32(value: u32) -> Self;

    /// Widen to `u32`. Lossless for both supported widths.
    fn as_u32(self) -> u32;
}

impl TickCount for u32 {
    const MAX_PERIOD: u32 = i32::MAX as u32;

    #[inline]
    fn diff(self, other: Self) -> i32 {
        self.wrapping_sub(other) as i32
    }

    #[inline]
    fn from_period(period: u32) -> Self {
        debug_assert!(period >= 1 && period <= Self::MAX_PERIOD);
        period
    }

    #[inline]
    fn wrapping_from_u32(value: u32) -> Self {
        value
    }

    #[inline]
    fn as_u32(self) -> u32 {
        self
    }
}

impl TickCount for u16 {
    const MAX_PERIOD: u32 = u16::MAX as u32;

    /// The subtraction happens in `u16`, and the result is reinterpreted as
    /// `i16` *before* widening. Widening first would lose the wraparound.
    #[inline]
    fn diff(self, other: Self) -> i32 {
        self.wrapping_sub(other) as i16 as i32
    }

    #[inline]
    fn from_period(period: u32) -> Self {
        debug_assert!(period >= 1 && period <= Self::MAX_PERIOD);
        period as u16
    }

    #[inline]
    fn wrapping_from_u32(value: u32) -> Self {
        value as u16
    }

    #[inline]
    fn as_u32(self) -> u32 {
        u32::from(self)
    }
}

/// Advance an overdue expiry past `current` by whole multiples of `period`.
///
/// Returns the smallest `expire + k * period` (`k >= 1`) that lies strictly
/// in the future relative to `current`, coalescing any missed intervals into
/// a single jump. Requires `current.diff(expire) >= 0`.
///
/// Contains a division, so callers run it *outside* the critical section and
/// re-validate the slot before committing the result.
pub(crate) fn catch_up<T: TickCount>(expire: T, period: u32, current: T) -> T {
    let overdue = current.diff(expire);
    debug_assert!(overdue >= 0);
    debug_assert!(period >= 1);

    let missed = Integer::div_floor(&(overdue as u32), &period) + 1;
    expire.wrapping_add(&T::wrapping_from_u32(missed.wrapping_mul(period)))
}
