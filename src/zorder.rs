//! Z-order (Morton) comparison and indirect sorting.
//!
//! Two rank-aligned tuples are ordered by the dimension holding the
//! highest most-significant differing bit; the dimensions are scanned
//! from k-1 down to 0 so that later dimensions win ties on equal bit
//! height. The xor trick avoids materialising interleaved keys: `y` has
//! a higher MSB than `x` exactly when `x < y` and `x < (x ^ y)`.

use core::cmp::Ordering;

#[cfg(not(test))]
use alloc::vec::Vec;

/// Compare points `a` and `b` (indices into the per-dimension columns)
/// in Z-order.
#[inline]
pub(crate) fn zorder_cmp(columns: &[Vec<u32>], a: usize, b: usize) -> Ordering {
    let mut dim = 0usize;
    let mut best = 0u32;
    for d in (0..columns.len()).rev() {
        let diff = columns[d][a] ^ columns[d][b];
        if msb_less(best, diff) {
            dim = d;
            best = diff;
        }
    }
    columns[dim][a].cmp(&columns[dim][b])
}

/// Sort an index array by Z-order of the points it refers to, leaving the
/// coordinate columns untouched. Ties on identical tuples break on the
/// original index, so the permutation is fully deterministic.
pub(crate) fn sort_indirect(columns: &[Vec<u32>], pointers: &mut [u32]) {
    debug_assert!(!columns.is_empty());
    debug_assert!(columns.iter().all(|c| c.len() == pointers.len()));
    pointers.sort_unstable_by(|&a, &b| {
        zorder_cmp(columns, a as usize, b as usize).then_with(|| a.cmp(&b))
    });
}

/// True if the most significant set bit of `y` is above that of `x`.
#[inline]
fn msb_less(x: u32, y: u32) -> bool {
    x < y && x < (x ^ y)
}
