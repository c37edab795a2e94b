//! # kdwave
//!
//! Succinct orthogonal range queries over static k-dimensional point sets.
//!
//! The index answers counting, reporting and uniform sampling of the
//! points inside an axis-aligned hyperrectangle, asymptotically faster
//! than a plain k-d tree when the rectangle covers many points. Its core
//! is the KDW-tree: one wavelet matrix per dimension over a shared global
//! point ordering, backed by succinct rank/select bit-vectors, with the
//! multi-dimensional tree derived from the matrices during the descent
//! rather than stored.
//!
//! ## Module Organization
//!
//! - [`bits`] - Succinct bit-vector family with rank/select and batched select
//! - [`monotone`] - Elias-Fano compressed non-decreasing sequences
//! - [`wavelet`] - Wavelet matrix with range counting and interval enumeration
//! - [`tree`] - The two range indexes (Z-order and externalized k-d ordering)
//!
//! ## Quick Start
//!
//! ```
//! use kdwave::ZOrderTree;
//!
//! // A 2-dimensional point set.
//! let points = vec![
//!     vec![0.0, 0.0], vec![1.0, 0.5], vec![2.0, 2.0],
//!     vec![3.0, 1.5], vec![4.0, 4.0],
//! ];
//! let tree = ZOrderTree::new(&points).unwrap();
//!
//! // How many points fall inside [1, 3] x [0, 2]?
//! assert_eq!(tree.count(&[1.0, 0.0], &[3.0, 2.0]).unwrap(), 3);
//!
//! // Which ones? Indices into the input array, in no particular order.
//! let mut hits = tree.report(&[1.0, 0.0], &[3.0, 2.0]).unwrap();
//! hits.sort_unstable();
//! assert_eq!(hits, vec![1, 2, 3]);
//! ```
//!
//! ## Features
//!
//! - `std` (default) - standard-library paths; disable for `no_std` + `alloc`
//! - `serde` - serialization support for the built indexes

// Use no_std unless std feature is enabled or we're in test mode
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// When using no_std, we need to explicitly link the alloc crate
#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

// When using std, re-export alloc types from std for compatibility
#[cfg(any(test, feature = "std"))]
extern crate std as alloc;

#[cfg(not(test))]
use alloc::vec::Vec;

use rand::RngCore;

// =============================================================================
// Core modules
// =============================================================================

/// Succinct bit-vector implementations with rank and select support.
pub mod bits;

/// Elias-Fano compressed monotone sequences.
pub mod monotone;

/// Wavelet matrix over integer sequences.
pub mod wavelet;

/// Orthogonal range query trees.
pub mod tree;

pub(crate) mod dict;
pub(crate) mod intervals;
pub(crate) mod sample;
pub(crate) mod util;
pub(crate) mod zorder;

// =============================================================================
// Public re-exports (convenience)
// =============================================================================

pub use bits::BitVec;
pub use monotone::Monotone;
pub use tree::{ExternalTree, InputError, ZOrderTree, MAX_DIMS};
pub use wavelet::WaveletMatrix;

// =============================================================================
// Core traits
// =============================================================================

/// Orthogonal range queries over a static point set.
///
/// Rectangles are inclusive on both ends; a rectangle with any
/// `min[d] > max[d]` is empty, not an error. `report` and `sample`
/// return indices into the original input array in unspecified order.
pub trait RangeIndex {
    /// Number of indexed points.
    fn len(&self) -> usize;

    /// True if the index holds no points.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the indexed points.
    fn dims(&self) -> usize;

    /// Number of points inside the rectangle.
    fn count(&self, min: &[f64], max: &[f64]) -> Result<usize, InputError>;

    /// Original indices of every point inside the rectangle.
    fn report(&self, min: &[f64], max: &[f64]) -> Result<Vec<usize>, InputError>;

    /// A uniform `count`-subset of the matching points' indices, without
    /// replacement; everything that matches when fewer than `count` do.
    fn sample(
        &self,
        min: &[f64],
        max: &[f64],
        count: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>, InputError>;
}

impl RangeIndex for ZOrderTree {
    fn len(&self) -> usize {
        ZOrderTree::len(self)
    }

    fn dims(&self) -> usize {
        ZOrderTree::dims(self)
    }

    fn count(&self, min: &[f64], max: &[f64]) -> Result<usize, InputError> {
        ZOrderTree::count(self, min, max)
    }

    fn report(&self, min: &[f64], max: &[f64]) -> Result<Vec<usize>, InputError> {
        ZOrderTree::report(self, min, max)
    }

    fn sample(
        &self,
        min: &[f64],
        max: &[f64],
        count: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>, InputError> {
        ZOrderTree::sample(self, min, max, count, rng)
    }
}

impl RangeIndex for ExternalTree {
    fn len(&self) -> usize {
        ExternalTree::len(self)
    }

    fn dims(&self) -> usize {
        ExternalTree::dims(self)
    }

    fn count(&self, min: &[f64], max: &[f64]) -> Result<usize, InputError> {
        ExternalTree::count(self, min, max)
    }

    fn report(&self, min: &[f64], max: &[f64]) -> Result<Vec<usize>, InputError> {
        ExternalTree::report(self, min, max)
    }

    fn sample(
        &self,
        min: &[f64],
        max: &[f64],
        count: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<usize>, InputError> {
        ExternalTree::sample(self, min, max, count, rng)
    }
}
