//! KDW-tree over the Z-order (Morton) point ordering.
//!
//! Construction turns every coordinate into its dense rank, left-aligns
//! the ranks to a common bit width, sorts the point indices along the
//! Morton curve and builds one wavelet matrix per dimension over that
//! ordering, all at the common depth. Queries then descend a *virtual*
//! k-d tree: a node is a contiguous slice of the ordering plus one
//! wavelet-matrix cursor per dimension, and splitting on a dimension's
//! next bit partitions every structure consistently via rank arithmetic.
//!
//! A `contained` bitmask records dimensions already fully inside the
//! query rectangle; narrow nodes fall back to a linear scan, and nodes
//! open in a single dimension delegate to that wavelet matrix alone.

#[cfg(not(test))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rand::RngCore;

use super::{
    build_dicts, check_points, check_rect, dim_bit, first_open_dim, resolve_intervals,
    slice_intervals, InputError, MAX_DIMS, STOP_WIDTH,
};
use crate::dict::RankDict;
use crate::intervals::Intervals;
use crate::util::float::next_up;
use crate::wavelet::WaveletMatrix;
use crate::zorder::sort_indirect;

/// One wavelet-matrix cursor of the virtual descent.
#[derive(Clone, Copy, Debug, Default)]
struct WmCursor {
    level: i32,
    start: u32,
    path: u32,
}

/// One virtual node: a slice of the global ordering plus per-dimension
/// cursors.
#[derive(Clone, Copy, Debug)]
struct Frame {
    contained: u32,
    dim: i32,
    root_start: usize,
    width: usize,
    wm: [WmCursor; MAX_DIMS],
}

/// Rank-space query rectangle, closed on both ends. Bounds are signed:
/// a maximum below every stored value legitimately translates to -1.
struct Query {
    qmin: [i64; MAX_DIMS],
    qmax: [i64; MAX_DIMS],
}

/// Static orthogonal range index ordered along the Morton curve.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZOrderTree {
    len: usize,
    dims: usize,
    dicts: Vec<RankDict>,
    shifts: Vec<u32>,
    /// Original index of the point at each position of the ordering.
    pointers: Vec<u32>,
    /// Rank-aligned coordinates per dimension, in curve order.
    columns: Vec<Vec<u32>>,
    wms: Vec<WaveletMatrix>,
}

impl ZOrderTree {
    /// Build the index over `points` (`n` rows of `k` finite doubles).
    pub fn new<P: AsRef<[f64]>>(points: &[P]) -> Result<Self, InputError> {
        let (n, k) = check_points(points)?;
        let dicts = build_dicts(points, n, k);

        let max_rank = dicts.iter().map(|d| d.max_rank()).max().unwrap();
        let depth = bits_for(max_rank as u32).max(1) as usize;
        let shifts: Vec<u32> = dicts
            .iter()
            .map(|d| depth as u32 - bits_for(d.max_rank() as u32).max(1))
            .collect();

        let mut columns: Vec<Vec<u32>> = Vec::with_capacity(k);
        for d in 0..k {
            let shift = shifts[d];
            columns.push(
                points
                    .iter()
                    .map(|p| (dicts[d].rank_of(p.as_ref()[d]) as u32) << shift)
                    .collect(),
            );
        }

        let mut pointers: Vec<u32> = (0..n as u32).collect();
        sort_indirect(&columns, &mut pointers);

        let mut wms = Vec::with_capacity(k);
        for column in columns.iter_mut() {
            let mut work: Vec<u32> = pointers.iter().map(|&p| column[p as usize]).collect();
            *column = work.clone();
            wms.push(WaveletMatrix::with_depth(&mut work, depth));
        }

        Ok(Self {
            len: n,
            dims: k,
            dicts,
            shifts,
            pointers,
            columns,
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
        let query = self.translate(min, max);
        let root = match self.root_frame(&query) {
            Some(root) => root,
            None => return Ok(0),
        };
        Ok(self.count_frame(&query, &root))
    }

    /// Original indices of all points inside the rectangle, unsorted.
    pub fn report(&self, min: &[f64], max: &[f64]) -> Result<Vec<usize>, InputError> {
        if !check_rect(min, max, self.dims)? {
            return Ok(Vec::new());
        }
        let query = self.translate(min, max);
        let mut intervals = Intervals::new();
        match self.root_frame(&query) {
            Some(root) => self.intervals_frame(&query, &root, &mut intervals),
            None => return Ok(Vec::new()),
        }
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
        let query = self.translate(min, max);
        let mut intervals = Intervals::new();
        match self.root_frame(&query) {
            Some(root) => self.intervals_frame(&query, &root, &mut intervals),
            None => return Ok(Vec::new()),
        }
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

    /// Heap storage in bits across all succinct structures.
    pub fn heap_bits(&self) -> usize {
        self.wms.iter().map(|w| w.heap_bits()).sum::<usize>()
            + self.dicts.iter().map(|d| d.heap_bits()).sum::<usize>()
            + self.columns.iter().map(|c| c.len() * 32).sum::<usize>()
            + self.pointers.len() * 32
    }

    /// Translate the real rectangle into closed rank-aligned bounds.
    fn translate(&self, min: &[f64], max: &[f64]) -> Query {
        let mut query = Query {
            qmin: [0; MAX_DIMS],
            qmax: [0; MAX_DIMS],
        };
        for d in 0..self.dims {
            let shift = self.shifts[d];
            let lo = self.dicts[d].rank_of(min[d]) as i64;
            let hi = self.dicts[d].rank_of(next_up(max[d])) as i64 - 1;
            query.qmin[d] = lo << shift;
            query.qmax[d] = (hi << shift) | ((1i64 << shift) - 1);
        }
        query
    }

    /// The root virtual node, or `None` when some dimension's whole value
    /// range misses the query.
    fn root_frame(&self, query: &Query) -> Option<Frame> {
        let mut contained = 0u32;
        for d in 0..self.dims {
            let vmin = self.wms[d].min_value() as i64;
            let vmax = self.wms[d].max_value() as i64;
            if vmin > query.qmax[d] || vmax < query.qmin[d] {
                return None;
            }
            if query.qmin[d] <= vmin && vmax <= query.qmax[d] {
                contained |= dim_bit(d);
            }
        }
        let mut frame = Frame {
            contained,
            dim: self.dims as i32 - 1,
            root_start: 0,
            width: self.len,
            wm: [WmCursor::default(); MAX_DIMS],
        };
        for d in 0..self.dims {
            frame.wm[d] = WmCursor {
                level: self.wms[d].depth() as i32 - 1,
                start: 0,
                path: 0,
            };
        }
        Some(frame)
    }

    fn count_frame(&self, query: &Query, frame: &Frame) -> usize {
        let open = self.dims - frame.contained.count_ones() as usize;
        if open == 0 {
            return frame.width;
        }
        if frame.width < STOP_WIDTH {
            return self.count_scan(query, frame, open);
        }
        if open == 1 {
            return self.count_1d(query, frame);
        }

        let mut result = 0usize;
        self.split(query, frame, |child| {
            result += self.count_frame(query, child);
        });
        result
    }

    /// Linear scan of the frame's slice over the dimensions still open.
    fn count_scan(&self, query: &Query, frame: &Frame, open: usize) -> usize {
        let s = frame.root_start;
        let e = s + frame.width;
        if open == 1 {
            let d = first_open_dim(frame.contained);
            let column = &self.columns[d];
            let (lo, hi) = (query.qmin[d], query.qmax[d]);
            return (s..e)
                .filter(|&j| {
                    let v = column[j] as i64;
                    v >= lo && v <= hi
                })
                .count();
        }
        let open_dims = self.open_dims(frame.contained);
        (s..e)
            .filter(|&j| {
                open_dims.iter().all(|&d| {
                    let v = self.columns[d][j] as i64;
                    v >= query.qmin[d] && v <= query.qmax[d]
                })
            })
            .count()
    }

    /// Count via the single open dimension's wavelet matrix.
    fn count_1d(&self, query: &Query, frame: &Frame) -> usize {
        let d = first_open_dim(frame.contained);
        let wm = &self.wms[d];
        let node = frame.wm[d];
        let start = node.start as usize;
        let end = start + frame.width;
        let (qmin, qmax) = (query.qmin[d], query.qmax[d]);

        // The node's value prefix range; the query straddles at least one
        // of its edges, otherwise the dimension would be closed already.
        let pmin = node.path as i64;
        let pmax = pmin | ((1i64 << (node.level + 1)) - 1);

        if pmax <= qmax {
            (end - start) - wm.prefix_less(node.level, start, end, qmin as u64)
        } else if qmin <= pmin {
            wm.prefix_less(node.level, start, end, (qmax + 1) as u64)
        } else {
            wm.prefix_less(node.level, start, end, (qmax + 1) as u64)
                - wm.prefix_less(node.level, start, end, qmin as u64)
        }
    }

    fn intervals_frame(&self, query: &Query, frame: &Frame, out: &mut Intervals) {
        let open = self.dims - frame.contained.count_ones() as usize;
        if open == 0 {
            out.add_root(frame.root_start, frame.root_start + frame.width);
            return;
        }
        if frame.width < STOP_WIDTH {
            self.intervals_scan(query, frame, open, out);
            return;
        }
        if open == 1 {
            let d = first_open_dim(frame.contained);
            let node = frame.wm[d];
            self.wms[d].subtree_intervals(
                d,
                node.level,
                node.start as usize,
                node.start as usize + frame.width,
                node.path as u64,
                query.qmin[d],
                query.qmax[d],
                out,
            );
            return;
        }

        self.split(query, frame, |child| {
            self.intervals_frame(query, child, out);
        });
    }

    /// Linear scan emitting maximal matching runs as root intervals.
    fn intervals_scan(&self, query: &Query, frame: &Frame, open: usize, out: &mut Intervals) {
        let s = frame.root_start;
        let e = s + frame.width;
        let open_dims = self.open_dims(frame.contained);
        let matches = |j: usize| {
            open_dims[..open].iter().all(|&d| {
                let v = self.columns[d][j] as i64;
                v >= query.qmin[d] && v <= query.qmax[d]
            })
        };
        let mut run_start = None;
        for j in s..e {
            if matches(j) {
                run_start.get_or_insert(j);
            } else if let Some(rs) = run_start.take() {
                out.add_root(rs, j);
            }
        }
        if let Some(rs) = run_start {
            out.add_root(rs, e);
        }
    }

    /// Split the frame on its round-robin dimension and visit the
    /// surviving children.
    fn split(&self, query: &Query, frame: &Frame, mut visit: impl FnMut(&Frame)) {
        let dim = if frame.dim < 0 {
            self.dims - 1
        } else {
            frame.dim as usize
        };
        let dbit = dim_bit(dim);
        let dim_contained = frame.contained & dbit != 0;
        let (qmin, qmax) = (query.qmin[dim], query.qmax[dim]);

        let node = frame.wm[dim];
        debug_assert!(node.level >= 0);
        let level = node.level as usize;
        let level_bit = 1u32 << level;
        let sbv = &self.wms[dim].levels[level];
        let start = node.start as usize;
        let end = start + frame.width;
        let s1 = sbv.rank1(start);
        let e1 = sbv.rank1(end);
        let s0 = start - s1;
        let e0 = end - e1;
        let width0 = e0 - s0;
        let width1 = e1 - s1;

        for one_child in [false, true] {
            let width = if one_child { width1 } else { width0 };
            if width == 0 {
                continue;
            }
            let pmin = if one_child {
                node.path | level_bit
            } else {
                node.path
            };
            let pmax = pmin | (level_bit - 1);

            let mut contained = frame.contained;
            if !dim_contained {
                if (pmin as i64) > qmax || (pmax as i64) < qmin {
                    continue;
                }
                if (pmin as i64) >= qmin && (pmax as i64) <= qmax {
                    contained |= dbit;
                }
            }

            let mut child = Frame {
                contained,
                dim: dim as i32 - 1,
                root_start: frame.root_start + if one_child { width0 } else { 0 },
                width,
                wm: frame.wm,
            };
            if one_child {
                // Every other structure shifts past the zero-child block.
                for cursor in child.wm.iter_mut().take(self.dims) {
                    cursor.start += width0 as u32;
                }
                child.wm[dim] = WmCursor {
                    level: node.level - 1,
                    start: (s1 + self.wms[dim].zeros[level]) as u32,
                    path: pmin,
                };
            } else {
                child.wm[dim] = WmCursor {
                    level: node.level - 1,
                    start: s0 as u32,
                    path: pmin,
                };
            }
            visit(&child);
        }
    }

    /// The dimensions not yet marked contained, in ascending order.
    fn open_dims(&self, contained: u32) -> Vec<usize> {
        (0..self.dims)
            .filter(|&d| contained & dim_bit(d) == 0)
            .collect()
    }
}

fn bits_for(v: u32) -> u32 {
    32 - v.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_5x4() -> Vec<Vec<f64>> {
        // 20 points spanning x in 0..5, y in 0..4.
        let mut points = Vec::new();
        for y in (0..4).rev() {
            for x in 0..5 {
                points.push(vec![x as f64, y as f64]);
            }
        }
        points
    }

    #[test]
    fn test_count_on_grid() {
        let tree = ZOrderTree::new(&grid_5x4()).unwrap();
        assert_eq!(tree.count(&[1.0, 1.0], &[2.0, 2.0]).unwrap(), 4);
        assert_eq!(tree.count(&[0.0, 0.0], &[4.0, 3.0]).unwrap(), 20);
        assert_eq!(tree.count(&[-1.0, -1.0], &[5.0, 5.0]).unwrap(), 20);
        assert_eq!(tree.count(&[5.0, 0.0], &[6.0, 4.0]).unwrap(), 0);
        assert_eq!(tree.count(&[2.0, 2.0], &[1.0, 1.0]).unwrap(), 0);
    }

    #[test]
    fn test_report_on_grid() {
        let tree = ZOrderTree::new(&grid_5x4()).unwrap();
        let mut got = tree.report(&[1.0, 1.0], &[2.0, 2.0]).unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![6, 7, 11, 12]);
        assert!(tree.report(&[5.0, 0.0], &[6.0, 4.0]).unwrap().is_empty());
    }

    #[test]
    fn test_bad_inputs() {
        assert_eq!(
            ZOrderTree::new::<Vec<f64>>(&[]).unwrap_err(),
            InputError::EmptyPointSet
        );
        let tree = ZOrderTree::new(&grid_5x4()).unwrap();
        assert!(matches!(
            tree.count(&[0.0], &[1.0, 1.0]),
            Err(InputError::RectDimension { .. })
        ));
        assert_eq!(
            tree.count(&[f64::NAN, 0.0], &[1.0, 1.0]),
            Err(InputError::NotFinite)
        );
    }
}
