//! KDW-tree over an explicit median-split k-d ordering.
//!
//! Instead of the Morton curve, the global ordering is the left-to-right
//! leaf order of a balanced k-d tree built on rank-space points. Nodes
//! split at the median of the cycling dimension, with the median value
//! assigned to the right child and the cut shifted when that would leave
//! a child empty or lopsided. Dimensions reduced to a single value are
//! skipped; when every dimension is, or a slice fits LEAF_SIZE, a leaf
//! keeps its points verbatim (coordinates interleaved).
//!
//! Queries walk the explicit tree, tracking the rectangle of each node,
//! and hand over to the per-dimension wavelet matrices once only one
//! dimension remains open.

#[cfg(not(test))]
use alloc::{boxed::Box, vec, vec::Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::RngCore;

use super::{
    build_dicts, check_points, check_rect, dim_bit, first_open_dim, resolve_intervals,
    slice_intervals, InputError, MAX_DIMS,
};
use crate::dict::RankDict;
use crate::intervals::Intervals;
use crate::util::float::next_up;
use crate::wavelet::WaveletMatrix;

/// Largest slice kept as a leaf.
const LEAF_SIZE: usize = 256;

/// One k-d tree node. `min`/`max` bound the node's points in its own
/// splitting dimension; `offset` is the node's start in leaf order.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct KdNode {
    dim: usize,
    offset: usize,
    size: usize,
    min: u32,
    max: u32,
    kind: NodeKind,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum NodeKind {
    Internal {
        max_left: u32,
        min_right: u32,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
    Leaf {
        /// Interleaved rank-space coordinates: x0, y0, ..., x1, y1, ...
        flat: Vec<u32>,
    },
}

/// Static orthogonal range index over the k-d leaf ordering.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExternalTree {
    len: usize,
    dims: usize,
    dicts: Vec<RankDict>,
    pointers: Vec<u32>,
    root: KdNode,
    root_mins: Vec<u32>,
    root_maxs: Vec<u32>,
    wms: Vec<WaveletMatrix>,
}

impl ExternalTree {
    /// Build the index over `points` (`n` rows of `k` finite doubles).
    pub fn new<P: AsRef<[f64]>>(points: &[P]) -> Result<Self, InputError> {
        let (n, k) = check_points(points)?;
        let dicts = build_dicts(points, n, k);

        let columns: Vec<Vec<u32>> = (0..k)
            .map(|d| {
                points
                    .iter()
                    .map(|p| dicts[d].rank_of(p.as_ref()[d]) as u32)
                    .collect()
            })
            .collect();
        let root_mins: Vec<u32> = columns.iter().map(|c| *c.iter().min().unwrap()).collect();
        let root_maxs: Vec<u32> = columns.iter().map(|c| *c.iter().max().unwrap()).collect();

        let mut pointers: Vec<u32> = (0..n as u32).collect();
        let mut work = vec![0u32; n];
        let mut offset = 0usize;
        let root = build_node(
            &columns,
            0,
            [false; MAX_DIMS],
            &mut pointers,
            0,
            n,
            &mut work,
            &mut offset,
        );
        debug_assert_eq!(offset, n);

        let mut wms = Vec::with_capacity(k);
        for column in &columns {
            let mut data: Vec<u32> = pointers.iter().map(|&p| column[p as usize]).collect();
            wms.push(WaveletMatrix::new(&mut data));
        }

        Ok(Self {
            len: n,
            dims: k,
            dicts,
            pointers,
            root,
            root_mins,
            root_maxs,
            wms,
        })
    }

    /// Number of indexed points.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the index holds no points (never, by construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dimensionality of the indexed points.
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of points inside the inclusive rectangle `[min, max]`.
    pub fn count(&self, min: &[f64], max: &[f64]) -> Result<usize, InputError> {
        if !check_rect(min, max, self.dims)? {
            return Ok(0);
        }
        let (qmin, qmax) = match self.translate(min, max) {
            Some(bounds) => bounds,
            None => return Ok(0),
        };
        let mut vmin = [0u32; MAX_DIMS];
        let mut vmax = [0u32; MAX_DIMS];
        vmin[..self.dims].copy_from_slice(&self.root_mins);
        vmax[..self.dims].copy_from_slice(&self.root_maxs);
        Ok(self.count_node(&self.root, vmin, vmax, &qmin, &qmax, 0))
    }

    /// Original indices of all points inside the rectangle, unsorted.
    pub fn report(&self, min: &[f64], max: &[f64]) -> Result<Vec<usize>, InputError> {
        if !check_rect(min, max, self.dims)? {
            return Ok(Vec::new());
        }
        let (qmin, qmax) = match self.translate(min, max) {
            Some(bounds) => bounds,
            None => return Ok(Vec::new()),
        };
        let intervals = self.collect_intervals(&qmin, &qmax);
        Ok(resolve_intervals(&self.wms, &self.pointers, &intervals))
    }

    /// Up to `count` distinct points drawn uniformly from the rectangle's
    /// contents; all of them when fewer match.
    pub fn sample<R: RngCore + ?Sized>(
        &self,
        min: &[f64],
        max: &[f64],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, InputError> {
        if count == 0 {
            return Err(InputError::ZeroSampleCount);
        }
        if !check_rect(min, max, self.dims)? {
            return Ok(Vec::new());
        }
        let (qmin, qmax) = match self.translate(min, max) {
            Some(bounds) => bounds,
            None => return Ok(Vec::new()),
        };
        let intervals = self.collect_intervals(&qmin, &qmax);
        let total = intervals.total();
        if total == 0 {
            return Ok(Vec::new());
        }
        if total <= count {
            return Ok(resolve_intervals(&self.wms, &self.pointers, &intervals));
        }
        let chosen = slice_intervals(&intervals, total, count, rng);
        Ok(resolve_intervals(&self.wms, &self.pointers, &chosen))
    }

    /// Heap storage in bits across the succinct structures.
    pub fn heap_bits(&self) -> usize {
        self.wms.iter().map(|w| w.heap_bits()).sum::<usize>()
            + self.dicts.iter().map(|d| d.heap_bits()).sum::<usize>()
            + self.pointers.len() * 32
    }

    /// Rank-space closed bounds, or `None` when some dimension is empty.
    fn translate(&self, min: &[f64], max: &[f64]) -> Option<([u32; MAX_DIMS], [u32; MAX_DIMS])> {
        let mut qmin = [0u32; MAX_DIMS];
        let mut qmax = [0u32; MAX_DIMS];
        for d in 0..self.dims {
            let lo = self.dicts[d].rank_of(min[d]) as i64;
            let hi = self.dicts[d].rank_of(next_up(max[d])) as i64 - 1;
            if lo > hi {
                return None;
            }
            qmin[d] = lo as u32;
            qmax[d] = hi as u32;
        }
        Some((qmin, qmax))
    }

    fn count_node(
        &self,
        node: &KdNode,
        mut vmin: [u32; MAX_DIMS],
        mut vmax: [u32; MAX_DIMS],
        qmin: &[u32; MAX_DIMS],
        qmax: &[u32; MAX_DIMS],
        contained: u32,
    ) -> usize {
        let dim = node.dim;
        if node.max < qmin[dim] || qmax[dim] < node.min {
            return 0;
        }
        vmin[dim] = node.min;
        vmax[dim] = node.max;

        let dbit = dim_bit(dim);
        let mut contained = contained;
        let mut dim_contained = false;
        if qmin[dim] <= node.min && node.max <= qmax[dim] {
            contained |= dbit;
            dim_contained = true;
        }

        let closed = contained.count_ones() as usize;
        if closed == self.dims {
            return node.size;
        }

        if closed == self.dims - 1 {
            let d = first_open_dim(contained);
            if qmin[d] <= vmin[d] && vmax[d] <= qmax[d] {
                return node.size;
            }
            return match &node.kind {
                NodeKind::Leaf { flat } => {
                    leaf_count_1d(flat, self.dims, d, qmin[d], qmax[d])
                }
                NodeKind::Internal { .. } => {
                    let wm = &self.wms[d];
                    let s = node.offset;
                    let e = s + node.size;
                    if vmax[d] <= qmax[d] {
                        node.size - wm.ranklt(qmin[d], s, e)
                    } else if qmin[d] <= vmin[d] {
                        wm.rankle(qmax[d], s, e)
                    } else {
                        wm.rankle(qmax[d], s, e) - wm.ranklt(qmin[d], s, e)
                    }
                }
            };
        }

        match &node.kind {
            NodeKind::Leaf { flat } => leaf_count(flat, self.dims, qmin, qmax),
            NodeKind::Internal {
                max_left,
                min_right,
                left,
                right,
            } => {
                if dim_contained {
                    let mut lmax = vmax;
                    lmax[dim] = *max_left;
                    let mut rmin = vmin;
                    rmin[dim] = *min_right;
                    self.count_node(left, vmin, lmax, qmin, qmax, contained)
                        + self.count_node(right, rmin, vmax, qmin, qmax, contained)
                } else {
                    let mut total = 0usize;
                    if qmin[dim] <= *max_left {
                        let mut newmax = vmax;
                        newmax[dim] = *max_left;
                        let child = if qmin[dim] <= node.min && *max_left <= qmax[dim] {
                            contained | dbit
                        } else {
                            contained
                        };
                        total += self.count_node(left, vmin, newmax, qmin, qmax, child);
                    }
                    if *min_right <= qmax[dim] {
                        let mut newmin = vmin;
                        newmin[dim] = *min_right;
                        let child = if qmin[dim] <= *min_right && node.max <= qmax[dim] {
                            contained | dbit
                        } else {
                            contained
                        };
                        total += self.count_node(right, newmin, vmax, qmin, qmax, child);
                    }
                    total
                }
            }
        }
    }

    /// Phase one walks the k-d tree emitting root intervals and pending
    /// single-dimension markers; phase two expands the markers through the
    /// wavelet matrices.
    fn collect_intervals(&self, qmin: &[u32; MAX_DIMS], qmax: &[u32; MAX_DIMS]) -> Intervals {
        let mut pending = Intervals::new();
        let mut vmin = [0u32; MAX_DIMS];
        let mut vmax = [0u32; MAX_DIMS];
        vmin[..self.dims].copy_from_slice(&self.root_mins);
        vmax[..self.dims].copy_from_slice(&self.root_maxs);
        self.intervals_node(&self.root, vmin, vmax, qmin, qmax, 0, &mut pending);

        let mut out = Intervals::new();
        for span in pending.iter() {
            match *span {
                crate::intervals::Span::Root { s, e } => out.add_root(s as usize, e as usize),
                crate::intervals::Span::Inner { s, e, tree, .. } => {
                    let d = tree as usize;
                    self.wms[d].range_intervals(
                        s as usize,
                        e as usize,
                        qmin[d] as i64,
                        qmax[d] as i64,
                        d,
                        &mut out,
                    );
                }
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn intervals_node(
        &self,
        node: &KdNode,
        mut vmin: [u32; MAX_DIMS],
        mut vmax: [u32; MAX_DIMS],
        qmin: &[u32; MAX_DIMS],
        qmax: &[u32; MAX_DIMS],
        contained: u32,
        out: &mut Intervals,
    ) {
        let dim = node.dim;
        if node.max < qmin[dim] || qmax[dim] < node.min {
            return;
        }
        vmin[dim] = node.min;
        vmax[dim] = node.max;

        let dbit = dim_bit(dim);
        let mut contained = contained;
        let mut dim_contained = false;
        if qmin[dim] <= node.min && node.max <= qmax[dim] {
            contained |= dbit;
            dim_contained = true;
        }

        let closed = contained.count_ones() as usize;
        if closed == self.dims {
            out.add_root(node.offset, node.offset + node.size);
            return;
        }

        if closed == self.dims - 1 {
            let d = first_open_dim(contained);
            match &node.kind {
                NodeKind::Leaf { flat } => {
                    leaf_intervals_1d(flat, self.dims, d, node.offset, qmin[d], qmax[d], out);
                }
                NodeKind::Internal { .. } => {
                    // Deferred 1-D search over this node's slice; the level
                    // tag is unused for these markers.
                    out.add_inner(node.offset, node.offset + node.size, d, 0);
                }
            }
            return;
        }

        match &node.kind {
            NodeKind::Leaf { flat } => {
                leaf_intervals(flat, self.dims, node.offset, qmin, qmax, out);
            }
            NodeKind::Internal {
                max_left,
                min_right,
                left,
                right,
            } => {
                if dim_contained {
                    let mut lmax = vmax;
                    lmax[dim] = *max_left;
                    let mut rmin = vmin;
                    rmin[dim] = *min_right;
                    self.intervals_node(left, vmin, lmax, qmin, qmax, contained, out);
                    self.intervals_node(right, rmin, vmax, qmin, qmax, contained, out);
                } else {
                    if qmin[dim] <= *max_left {
                        let mut newmax = vmax;
                        newmax[dim] = *max_left;
                        let child = if qmin[dim] <= node.min && *max_left <= qmax[dim] {
                            contained | dbit
                        } else {
                            contained
                        };
                        self.intervals_node(left, vmin, newmax, qmin, qmax, child, out);
                    }
                    if *min_right <= qmax[dim] {
                        let mut newmin = vmin;
                        newmin[dim] = *min_right;
                        let child = if qmin[dim] <= *min_right && node.max <= qmax[dim] {
                            contained | dbit
                        } else {
                            contained
                        };
                        self.intervals_node(right, newmin, vmax, qmin, qmax, child, out);
                    }
                }
            }
        }
    }
}

/// Count leaf points whose dimension `d` lies in `[lo, hi]`.
fn leaf_count_1d(flat: &[u32], k: usize, d: usize, lo: u32, hi: u32) -> usize {
    flat.iter()
        .skip(d)
        .step_by(k)
        .filter(|&&v| v >= lo && v <= hi)
        .count()
}

/// Count leaf points inside the whole rectangle.
fn leaf_count(flat: &[u32], k: usize, qmin: &[u32; MAX_DIMS], qmax: &[u32; MAX_DIMS]) -> usize {
    flat.chunks_exact(k)
        .filter(|point| {
            point
                .iter()
                .enumerate()
                .all(|(d, &v)| v >= qmin[d] && v <= qmax[d])
        })
        .count()
}

/// Emit maximal runs of in-range leaf points on dimension `d`.
fn leaf_intervals_1d(
    flat: &[u32],
    k: usize,
    d: usize,
    offset: usize,
    lo: u32,
    hi: u32,
    out: &mut Intervals,
) {
    let mut run_start = None;
    let mut pos = offset;
    for v in flat.iter().skip(d).step_by(k) {
        if *v >= lo && *v <= hi {
            run_start.get_or_insert(pos);
        } else if let Some(rs) = run_start.take() {
            out.add_root(rs, pos);
        }
        pos += 1;
    }
    if let Some(rs) = run_start {
        out.add_root(rs, pos);
    }
}

/// Emit maximal runs of leaf points inside the whole rectangle.
fn leaf_intervals(
    flat: &[u32],
    k: usize,
    offset: usize,
    qmin: &[u32; MAX_DIMS],
    qmax: &[u32; MAX_DIMS],
    out: &mut Intervals,
) {
    let mut run_start = None;
    let mut pos = offset;
    for point in flat.chunks_exact(k) {
        let inside = point
            .iter()
            .enumerate()
            .all(|(d, &v)| v >= qmin[d] && v <= qmax[d]);
        if inside {
            run_start.get_or_insert(pos);
        } else if let Some(rs) = run_start.take() {
            out.add_root(rs, pos);
        }
        pos += 1;
    }
    if let Some(rs) = run_start {
        out.add_root(rs, pos);
    }
}

/// Recursively partition `pointers[start..end)`, returning the subtree.
#[allow(clippy::too_many_arguments)]
fn build_node(
    columns: &[Vec<u32>],
    start_dim: usize,
    mut ignore: [bool; MAX_DIMS],
    pointers: &mut [u32],
    start: usize,
    end: usize,
    work: &mut [u32],
    offset: &mut usize,
) -> KdNode {
    let k = columns.len();
    let size = end - start;
    let mut dim = start_dim;

    if size <= LEAF_SIZE {
        return build_leaf(columns, dim, pointers, start, end, offset);
    }

    for _ in 0..k {
        if ignore[dim] {
            dim = (dim + 1) % k;
            continue;
        }
        let col = &columns[dim];
        for i in 0..size {
            work[i] = col[pointers[start + i] as usize];
        }
        work[..size].select_nth_unstable(size / 2);
        let mut median = work[size / 2];

        // One pass for the node statistics around the median.
        let mut min = u32::MAX;
        let mut max = 0u32;
        let mut max_left: i64 = i64::MIN;
        let mut next_median: i64 = i64::MAX;
        let mut lesser = 0usize;
        let mut greater = 0usize;
        for &v in &work[..size] {
            min = min.min(v);
            max = max.max(v);
            if v < median {
                max_left = max_left.max(v as i64);
                lesser += 1;
            } else if v > median {
                next_median = next_median.min(v as i64);
                greater += 1;
            }
        }

        // The median value goes to the right child; shift the cut when the
        // left side would be empty or clearly outnumbered.
        if lesser > 0 {
            if lesser < greater {
                max_left = median as i64;
                median = next_median as u32;
            }
        } else if greater > 0 {
            max_left = median as i64;
            median = next_median as u32;
        } else {
            // A single value: this dimension cannot split the slice.
            ignore[dim] = true;
            dim = (dim + 1) % k;
            continue;
        }

        // Stable partition of the pointer slice around the cut.
        let mut left_end = start;
        let mut right = 0usize;
        for i in start..end {
            let pt = pointers[i];
            if col[pt as usize] < median {
                pointers[left_end] = pt;
                left_end += 1;
            } else {
                work[right] = pt;
                right += 1;
            }
        }
        pointers[left_end..end].copy_from_slice(&work[..right]);

        let node_offset = *offset;
        let next_dim = (dim + 1) % k;
        let left = build_node(
            columns, next_dim, ignore, pointers, start, left_end, work, offset,
        );
        let right_child = build_node(
            columns, next_dim, ignore, pointers, left_end, end, work, offset,
        );

        return KdNode {
            dim,
            offset: node_offset,
            size,
            min,
            max,
            kind: NodeKind::Internal {
                max_left: max_left as u32,
                min_right: median,
                left: Box::new(left),
                right: Box::new(right_child),
            },
        };
    }

    // Every dimension is down to a single value.
    build_leaf(columns, dim, pointers, start, end, offset)
}

fn build_leaf(
    columns: &[Vec<u32>],
    dim: usize,
    pointers: &mut [u32],
    start: usize,
    end: usize,
    offset: &mut usize,
) -> KdNode {
    let k = columns.len();
    let size = end - start;
    let mut flat = vec![0u32; k * size];
    let mut min = u32::MAX;
    let mut max = 0u32;
    for (i, &pt) in pointers[start..end].iter().enumerate() {
        for (d, col) in columns.iter().enumerate() {
            let v = col[pt as usize];
            flat[i * k + d] = v;
            if d == dim {
                min = min.min(v);
                max = max.max(v);
            }
        }
    }
    let node = KdNode {
        dim,
        offset: *offset,
        size,
        min,
        max,
        kind: NodeKind::Leaf { flat },
    };
    *offset += size;
    node
}
