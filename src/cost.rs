//! Edge and path costs.

use num_traits::ToPrimitive;

/// A non-negative cost.
///
/// `max_value()` is reserved as the "infinite" sentinel, used both for edges
/// that do not exist and for dead-end heuristic values.
///
/// ```
/// use hsearch::cost::Cost;
///
/// assert!(3u32.valid());
/// assert!(!<u32 as Cost>::infinity().valid());
/// assert_eq!(7u32.as_f64(), 7.0);
/// assert_eq!(<u32 as Cost>::infinity().as_f64(), f64::INFINITY);
/// ```
pub trait Cost:
    Copy
    + std::fmt::Debug
    + std::fmt::Display
    + PartialEq
    + core::cmp::Eq
    + PartialOrd
    + Ord
    + std::hash::Hash
    + num_traits::SaturatingAdd
    + num_traits::bounds::UpperBounded
    + num_traits::Zero
    + num_traits::One
    + std::ops::Add<Self, Output = Self>
    + std::ops::Sub<Self, Output = Self>
    + std::ops::AddAssign
    + ToPrimitive
{
    #[inline(always)]
    fn valid(&self) -> bool {
        *self != num_traits::bounds::UpperBounded::max_value()
    }

    #[inline(always)]
    fn infinity() -> Self {
        num_traits::bounds::UpperBounded::max_value()
    }

    /// Lossy conversion used by floating point priorities.
    #[inline(always)]
    fn as_f64(&self) -> f64 {
        if !self.valid() {
            return f64::INFINITY;
        }
        self.to_f64().unwrap_or(f64::INFINITY)
    }

    /// The cost as a bucket number for integer priority queues.
    #[inline(always)]
    fn as_bucket(&self) -> usize {
        self.to_usize().unwrap_or(usize::MAX)
    }
}

impl Cost for u8 {}
impl Cost for u16 {}
impl Cost for u32 {}
impl Cost for u64 {}
impl Cost for usize {}
