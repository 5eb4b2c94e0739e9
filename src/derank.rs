//! Arg-min over the handful of children of a heap node.
//!
//! Instead of a left-to-right fold, the minimum is found with a tournament
//! of pairwise fights. The comparisons within one round don't depend on each
//! other, which lets the CPU overlap them.
//!
//! ```text
//! 0   1 2   3 4   5   6
//! *   * *   * *   *   *
//!  \ /   \ /   \ /   /
//!   *     *     *   /
//!    \   /       \ /
//!      *          *
//!        \       /
//!            *
//! ```

/// Core comparison and index selection. Ties go left.
#[inline(always)]
#[must_use]
fn fight<T: PartialOrd>(a: &[T], l: usize, r: usize) -> usize {
    if a[l] <= a[r] { l } else { r }
}

/// Index of the left-most minimum of a non-empty slice.
///
/// ```
/// use hsearch::derank::derank;
/// assert_eq!(derank(&[3, 1, 2]), 1);
/// assert_eq!(derank(&[5, 0, 7, 0]), 1);
/// ```
#[inline(always)]
#[must_use]
pub fn derank<T: PartialOrd>(a: &[T]) -> usize {
    debug_assert!(!a.is_empty(), "No minimum in an empty slice");
    match a.len() {
        0 | 1 => 0,
        2 => fight(a, 0, 1),
        3 => fight(a, fight(a, 0, 1), 2),
        4 => fight(a, fight(a, 0, 1), fight(a, 2, 3)),
        n => {
            // Left half is the largest power of two below n
            let mid = n.next_power_of_two() / 2;
            let l = derank(&a[..mid]);
            let r = mid + derank(&a[mid..]);
            fight(a, l, r)
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn linear_min_index<T: PartialOrd>(xs: &[T]) -> usize {
        assert!(!xs.is_empty());

        let mut min_i = 0;
        for (i, x) in xs.iter().enumerate() {
            if *x < xs[min_i] {
                min_i = i;
            }
        }
        min_i
    }

    #[test]
    fn ties_go_left() {
        assert_eq!(derank(&[2u8, 2, 2, 2, 2, 2, 2, 2]), 0);
        assert_eq!(derank(&[3u8, 1, 5, 1, 1]), 1);
    }

    proptest! {
        #[test]
        fn agrees_with_linear_scan(a in prop::collection::vec(0..8u8, 1..=16)) {
            prop_assert_eq!(derank(&a), linear_min_index(&a));
        }
    }
}
