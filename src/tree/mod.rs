//! Orthogonal range query trees.
//!
//! Two equally supported variants share the same wavelet-matrix core and
//! query surface, differing only in the global point ordering they build:
//!
//! - [`ZOrderTree`] orders points along the Morton curve and descends a
//!   virtual k-d tree derived from the wavelet matrices on the fly.
//! - [`ExternalTree`] materialises a balanced median-split k-d tree and
//!   uses its leaf order.

pub mod external;
pub mod zorder;

pub use external::ExternalTree;
pub use zorder::ZOrderTree;

use core::fmt;

#[cfg(not(test))]
use alloc::vec::Vec;

use rand::RngCore;

use crate::dict::RankDict;
use crate::intervals::{IntBuf, Intervals, Span, SCRATCH_CAPACITY};
use crate::sample::partial_permutation;
use crate::wavelet::WaveletMatrix;

/// Highest supported dimensionality.
pub const MAX_DIMS: usize = 31;

/// Node width below which descent switches to a linear scan.
pub(crate) const STOP_WIDTH: usize = 256;

/// Invalid input to construction or a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    /// The point set is empty.
    EmptyPointSet,
    /// Dimensionality outside `[2, MAX_DIMS]`.
    BadDimension(usize),
    /// A point whose length differs from the first point's.
    RaggedPoint(usize),
    /// A NaN or infinite coordinate.
    NotFinite,
    /// Rectangle arrays whose length is not the tree's dimensionality.
    RectDimension { expected: usize, got: usize },
    /// A sampling request for zero points.
    ZeroSampleCount,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPointSet => write!(f, "point set is empty"),
            Self::BadDimension(k) => {
                write!(f, "dimensionality {} not in [2, {}]", k, MAX_DIMS)
            }
            Self::RaggedPoint(i) => write!(f, "point {} has a different dimensionality", i),
            Self::NotFinite => write!(f, "coordinate is NaN or infinite"),
            Self::RectDimension { expected, got } => {
                write!(f, "rectangle has {} dimensions, tree has {}", got, expected)
            }
            Self::ZeroSampleCount => write!(f, "sample count must be positive"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InputError {}

/// Validate the input point array; returns `(n, k)`.
pub(crate) fn check_points<P: AsRef<[f64]>>(points: &[P]) -> Result<(usize, usize), InputError> {
    let n = points.len();
    if n == 0 {
        return Err(InputError::EmptyPointSet);
    }
    let k = points[0].as_ref().len();
    if !(2..=MAX_DIMS).contains(&k) {
        return Err(InputError::BadDimension(k));
    }
    for (i, p) in points.iter().enumerate() {
        let row = p.as_ref();
        if row.len() != k {
            return Err(InputError::RaggedPoint(i));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(InputError::NotFinite);
        }
    }
    Ok((n, k))
}

/// Validate a query rectangle. `Ok(false)` means a well-formed rectangle
/// that is empty because some `min > max`.
pub(crate) fn check_rect(min: &[f64], max: &[f64], dims: usize) -> Result<bool, InputError> {
    if min.len() != dims {
        return Err(InputError::RectDimension {
            expected: dims,
            got: min.len(),
        });
    }
    if max.len() != dims {
        return Err(InputError::RectDimension {
            expected: dims,
            got: max.len(),
        });
    }
    for d in 0..dims {
        if !min[d].is_finite() || !max[d].is_finite() {
            return Err(InputError::NotFinite);
        }
        if min[d] > max[d] {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Build one rank dictionary per dimension from the validated points.
pub(crate) fn build_dicts<P: AsRef<[f64]>>(points: &[P], n: usize, k: usize) -> Vec<RankDict> {
    let mut dicts = Vec::with_capacity(k);
    let mut column = Vec::with_capacity(n);
    for d in 0..k {
        column.clear();
        column.extend(points.iter().map(|p| p.as_ref()[d]));
        dicts.push(RankDict::build(&column));
    }
    dicts
}

/// Index of the first dimension not yet marked contained.
///
/// Containment bits run from the most significant end: bit `31 - d`
/// covers dimension `d`, so the first zero bit is found by counting the
/// leading ones.
#[inline]
pub(crate) fn first_open_dim(contained: u32) -> usize {
    (!contained).leading_zeros() as usize
}

/// The MSB-anchored mask bit for dimension `d`.
#[inline]
pub(crate) fn dim_bit(d: usize) -> u32 {
    0x8000_0000u32 >> d
}

/// Expand tagged intervals into original point indices: root intervals
/// dereference the permutation directly, inner intervals are first lifted
/// through their wavelet matrix.
pub(crate) fn resolve_intervals(
    wms: &[WaveletMatrix],
    pointers: &[u32],
    intervals: &Intervals,
) -> Vec<usize> {
    let mut out = Vec::with_capacity(intervals.total());
    let mut lifted = Intervals::new();
    let mut w1 = IntBuf::with_capacity(SCRATCH_CAPACITY);
    let mut w2 = IntBuf::with_capacity(SCRATCH_CAPACITY);
    for span in intervals.iter() {
        match *span {
            Span::Root { s, e } => {
                out.extend((s..e).map(|i| pointers[i as usize] as usize));
            }
            Span::Inner { s, e, tree, level } => {
                lifted.clear();
                wms[tree as usize].inner_to_root(
                    level as i32,
                    s as usize,
                    e as usize,
                    &mut lifted,
                    &mut w1,
                    &mut w2,
                );
                for root in lifted.iter() {
                    if let Span::Root { s, e } = *root {
                        out.extend((s..e).map(|i| pointers[i as usize] as usize));
                    }
                }
            }
        }
    }
    out
}

/// Pick `count` positions uniformly out of `total` and slice them back
/// through the interval list, preserving each pick's tag.
pub(crate) fn slice_intervals<R: RngCore + ?Sized>(
    intervals: &Intervals,
    total: usize,
    count: usize,
    rng: &mut R,
) -> Intervals {
    let mut picks = partial_permutation(total, count, rng);
    picks.sort_unstable();

    let mut chosen = Intervals::with_capacity(count);
    let mut processed = 0usize;
    let mut pi = 0usize;
    for span in intervals.iter() {
        let w = span.width();
        while pi < count {
            let sample = picks[pi] as usize;
            if sample >= processed + w {
                break;
            }
            let offset = sample - processed;
            match *span {
                Span::Root { s, .. } => {
                    let p = s as usize + offset;
                    chosen.add_root(p, p + 1);
                }
                Span::Inner { s, tree, level, .. } => {
                    let p = s as usize + offset;
                    chosen.add_inner(p, p + 1, tree as usize, level as i32);
                }
            }
            pi += 1;
        }
        if pi >= count {
            break;
        }
        processed += w;
    }
    chosen
}
