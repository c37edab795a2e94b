//! Wavelet matrix over non-negative integers.
//!
//! Levels are built MSB-first: level `l` records bit `l` of every element
//! in the order induced by stably splitting all higher levels (zeros
//! before ones). `zeros[l]` counts the zero bits on level `l`; descending
//! into the one-child adds it to the mapped position. On top of that
//! partition arithmetic sit exact and threshold rank counts, directional
//! select,
//! the enumeration of maximal in-range position intervals, and the
//! inverse mapping from an inner-level interval back to top-level
//! positions.

#[cfg(not(test))]
use alloc::{vec, vec::Vec};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::{BitBuf, BitVec};
use crate::intervals::{IntBuf, Intervals};

/// Level-stacked bit-vector representation of an integer sequence.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WaveletMatrix {
    len: usize,
    depth: usize,
    vmin: u32,
    vmax: u32,
    /// One bit-vector per level, indexed by bit position (0 = LSB).
    pub(crate) levels: Vec<BitVec>,
    /// Zero-bit count per level.
    pub(crate) zeros: Vec<usize>,
}

impl WaveletMatrix {
    /// Build over `data` with depth `bits(max value)`.
    ///
    /// The slice is consumed as scratch: it ends up reordered.
    pub fn new(data: &mut [u32]) -> Self {
        Self::build(data, None)
    }

    /// Build over `data` with an explicit depth, keeping only the low
    /// `depth` bits of each element.
    ///
    /// # Panics
    ///
    /// Panics if `data` is empty or `depth` is 0 or greater than 32.
    pub fn with_depth(data: &mut [u32], depth: usize) -> Self {
        assert!(depth >= 1 && depth <= 32, "depth out of range: {}", depth);
        Self::build(data, Some(depth))
    }

    fn build(data: &mut [u32], forced_depth: Option<usize>) -> Self {
        assert!(!data.is_empty(), "empty sequence");
        let len = data.len();
        let vmin = *data.iter().min().unwrap();
        let vmax = *data.iter().max().unwrap();
        let depth = forced_depth.unwrap_or_else(|| {
            if vmax == 0 {
                1
            } else {
                (32 - vmax.leading_zeros()) as usize
            }
        });

        let mut levels: Vec<BitVec> = (0..depth).map(|_| BitVec::AllZeros(0)).collect();
        let mut zeros = vec![0usize; depth];
        let mut scratch = vec![0u32; len];

        for lv in (0..depth).rev() {
            let mut buf = BitBuf::with_capacity(len);
            let mut n0 = 0usize;
            let mut n1 = 0usize;
            for i in 0..len {
                let value = data[i];
                let bit = (value >> lv) & 1 == 1;
                buf.push(bit);
                if bit {
                    scratch[n1] = value;
                    n1 += 1;
                } else {
                    data[n0] = value;
                    n0 += 1;
                }
            }
            data[n0..].copy_from_slice(&scratch[..n1]);
            levels[lv] = BitVec::build(&buf);
            zeros[lv] = n0;
        }

        Self {
            len,
            depth,
            vmin,
            vmax,
            levels,
            zeros,
        }
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the matrix holds no elements (never, by construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Smallest stored value.
    #[inline]
    pub fn min_value(&self) -> u32 {
        self.vmin
    }

    /// Largest stored value.
    #[inline]
    pub fn max_value(&self) -> u32 {
        self.vmax
    }

    /// The value at position `i`.
    pub fn access(&self, i: usize) -> u32 {
        assert!(i < self.len, "position out of range: {}", i);
        let mut value = 0u32;
        let mut p = i;
        for lv in (0..self.depth).rev() {
            let sbv = &self.levels[lv];
            if sbv.get(p) {
                value |= 1 << lv;
                p = sbv.rank1(p) + self.zeros[lv];
            } else {
                p = sbv.rank0(p);
            }
        }
        value
    }

    /// Occurrences of `c` in positions `[s, e)`.
    pub fn rank(&self, c: u32, s: usize, e: usize) -> usize {
        self.check_range(s, e);
        if s == e || c < self.vmin || c > self.vmax {
            return 0;
        }
        let mut start = s;
        let mut end = e;
        for lv in (0..self.depth).rev() {
            let sbv = &self.levels[lv];
            if (c >> lv) & 1 == 1 {
                start = sbv.rank1(start) + self.zeros[lv];
                end = sbv.rank1(end) + self.zeros[lv];
            } else {
                start = sbv.rank0(start);
                end = sbv.rank0(end);
            }
            if start >= end {
                return 0;
            }
        }
        end - start
    }

    /// Occurrences strictly less than `c` in positions `[s, e)`.
    pub fn ranklt(&self, c: u32, s: usize, e: usize) -> usize {
        self.check_range(s, e);
        if s == e || c <= self.vmin {
            return 0;
        }
        if c > self.vmax {
            return e - s;
        }
        self.prefix_less((self.depth - 1) as i32, s, e, c as u64)
    }

    /// Occurrences strictly greater than `c` in positions `[s, e)`.
    pub fn rankgt(&self, c: u32, s: usize, e: usize) -> usize {
        self.check_range(s, e);
        if s == e || c >= self.vmax {
            return 0;
        }
        if c < self.vmin {
            return e - s;
        }
        let mut result = 0usize;
        let (mut s, mut e) = (s, e);
        for lv in (0..self.depth).rev() {
            let sbv = &self.levels[lv];
            let s1 = sbv.rank1(s);
            let e1 = sbv.rank1(e);
            if (c >> lv) & 1 == 1 {
                if s1 >= e1 {
                    break;
                }
                s = s1 + self.zeros[lv];
                e = e1 + self.zeros[lv];
            } else {
                // Bit 0 in c: every one-child element here exceeds c.
                result += e1 - s1;
                s -= s1;
                e -= e1;
                if s >= e {
                    break;
                }
            }
        }
        result
    }

    /// Occurrences less than or equal to `c` in positions `[s, e)`.
    #[inline]
    pub fn rankle(&self, c: u32, s: usize, e: usize) -> usize {
        e - s - self.rankgt(c, s, e)
    }

    /// Occurrences greater than or equal to `c` in positions `[s, e)`.
    #[inline]
    pub fn rankge(&self, c: u32, s: usize, e: usize) -> usize {
        e - s - self.ranklt(c, s, e)
    }

    /// Position of the (i+1)-th occurrence of `c` inside `[s, e)`,
    /// counted from the front (`forward`) or the back.
    pub fn select(&self, c: u32, i: usize, s: usize, e: usize, forward: bool) -> Option<usize> {
        self.check_range(s, e);
        if s == e || i >= e - s || c < self.vmin || c > self.vmax {
            return None;
        }

        // Descend to c's leaf interval.
        let mut start = s;
        let mut end = e;
        for lv in (0..self.depth).rev() {
            let sbv = &self.levels[lv];
            if (c >> lv) & 1 == 1 {
                start = sbv.rank1(start) + self.zeros[lv];
                end = sbv.rank1(end) + self.zeros[lv];
            } else {
                start = sbv.rank0(start);
                end = sbv.rank0(end);
            }
            if start >= end {
                return None;
            }
        }

        let mut p = if forward {
            let p = start + i;
            if p >= end {
                return None;
            }
            p
        } else {
            let offset = i;
            if end - 1 < start + offset {
                return None;
            }
            end - 1 - offset
        };

        // Climb back to the root with selects.
        for lv in 0..self.depth {
            let sbv = &self.levels[lv];
            if (c >> lv) & 1 == 1 {
                p = sbv.select1(p - self.zeros[lv]);
            } else {
                p = sbv.select0(p);
            }
        }
        Some(p)
    }

    /// Count of values strictly below `c` in the sub-tree rooted at level
    /// `lv` over `[s, e)`.
    ///
    /// `c` must fall inside the sub-tree's value prefix (only bits at and
    /// below `lv` are inspected), which the descent callers guarantee.
    pub(crate) fn prefix_less(&self, lv: i32, s: usize, e: usize, c: u64) -> usize {
        let mut result = 0usize;
        let (mut s, mut e) = (s, e);
        let mut lv = lv;
        while lv >= 0 {
            let sbv = &self.levels[lv as usize];
            let s1 = sbv.rank1(s);
            let e1 = sbv.rank1(e);
            if (c >> lv) & 1 == 1 {
                // Bit 1 in c: the whole zero-child sits below c.
                if s1 < e1 {
                    result += (e - e1) - (s - s1);
                    s = s1 + self.zeros[lv as usize];
                    e = e1 + self.zeros[lv as usize];
                } else {
                    result += e - s;
                    break;
                }
            } else {
                s -= s1;
                e -= e1;
                if s >= e {
                    break;
                }
            }
            lv -= 1;
        }
        result
    }

    /// Enumerate maximal position intervals in `[s, e)` whose values lie in
    /// `[min, max]`, tagging sub-level results with `tree`.
    ///
    /// Fully covered ranges collapse to a single root interval; partial
    /// coverage yields inner intervals at the level where containment was
    /// decided.
    pub(crate) fn range_intervals(
        &self,
        s: usize,
        e: usize,
        min: i64,
        max: i64,
        tree: usize,
        out: &mut Intervals,
    ) {
        if s >= self.len || s >= e {
            return;
        }
        let e = e.min(self.len);
        let (min, max) = (min.max(self.vmin as i64), max.min(self.vmax as i64));
        if min > max {
            return;
        }

        if e - s == 1 {
            // Single position: reconstruct its value prefix and test.
            let mut prefix = 0u64;
            let mut p = s;
            for lv in (0..self.depth).rev() {
                let sbv = &self.levels[lv];
                if sbv.get(p) {
                    prefix |= 1 << lv;
                    p = sbv.rank1(p) + self.zeros[lv];
                } else {
                    p = sbv.rank0(p);
                }
                let lo = prefix as i64;
                let hi = (prefix | ((1u64 << lv) - 1)) as i64;
                if lo > max || hi < min {
                    return;
                }
                if lo >= min && hi <= max {
                    out.add_root(s, s + 1);
                    return;
                }
            }
            return;
        }

        // DFS over the implicit tree with an explicit stack.
        let mut stack: Vec<(u64, i32, usize, usize)> = Vec::with_capacity(4 * self.depth);
        let mut found: Vec<(usize, usize, i32)> = Vec::with_capacity(2 * self.depth);
        let mut covered = 0usize;
        stack.push((0, self.depth as i32 - 1, s, e));

        while let Some((path, lv, ts, te)) = stack.pop() {
            let sbv = &self.levels[lv as usize];
            let s1 = sbv.rank1(ts);
            let e1 = sbv.rank1(te);
            let s0 = ts - s1;
            let e0 = te - e1;
            let bit = 1u64 << lv;

            if s0 < e0 {
                let lo = path as i64;
                let hi = (path | (bit - 1)) as i64;
                if lo > max || hi < min {
                    // prune
                } else if lo >= min && hi <= max {
                    found.push((s0, e0, lv - 1));
                    covered += e0 - s0;
                } else {
                    stack.push((path, lv - 1, s0, e0));
                }
            }
            if s1 < e1 {
                let z = self.zeros[lv as usize];
                let lo = (path | bit) as i64;
                let hi = (path | bit | (bit - 1)) as i64;
                if lo > max || hi < min {
                    // prune
                } else if lo >= min && hi <= max {
                    found.push((z + s1, z + e1, lv - 1));
                    covered += e1 - s1;
                } else {
                    stack.push((path | bit, lv - 1, z + s1, z + e1));
                }
            }
        }

        if covered == e - s {
            out.add_root(s, e);
        } else {
            for (is, ie, lv) in found {
                out.add_inner(is, ie, tree, lv);
            }
        }
    }

    /// Enumerate in-range intervals for the sub-tree rooted at level `lv`
    /// over `[s, e)` with value prefix `path`.
    pub(crate) fn subtree_intervals(
        &self,
        tree: usize,
        lv: i32,
        s: usize,
        e: usize,
        path: u64,
        qmin: i64,
        qmax: i64,
        out: &mut Intervals,
    ) {
        if lv < 0 {
            return;
        }
        let sbv = &self.levels[lv as usize];
        let s1 = sbv.rank1(s);
        let e1 = sbv.rank1(e);
        let s0 = s - s1;
        let e0 = e - e1;
        let bit = 1u64 << lv;

        if s0 < e0 {
            let lo = path as i64;
            let hi = (path | (bit - 1)) as i64;
            if lo > qmax || hi < qmin {
                // prune
            } else if lo >= qmin && hi <= qmax {
                out.add_inner(s0, e0, tree, lv - 1);
            } else {
                self.subtree_intervals(tree, lv - 1, s0, e0, path, qmin, qmax, out);
            }
        }
        if s1 < e1 {
            let z = self.zeros[lv as usize];
            let lo = (path | bit) as i64;
            let hi = (path | bit | (bit - 1)) as i64;
            if lo > qmax || hi < qmin {
                // prune
            } else if lo >= qmin && hi <= qmax {
                out.add_inner(z + s1, z + e1, tree, lv - 1);
            } else {
                self.subtree_intervals(tree, lv - 1, z + s1, z + e1, path | bit, qmin, qmax, out);
            }
        }
    }

    /// Lift an inner interval at level `lv` back to root positions.
    ///
    /// Each level above `lv` maps the interval set through batched select
    /// on that level's bit-vector; a 1-length interval takes the plain
    /// select ladder instead.
    pub(crate) fn inner_to_root(
        &self,
        lv: i32,
        is: usize,
        ie: usize,
        out: &mut Intervals,
        work1: &mut IntBuf,
        work2: &mut IntBuf,
    ) {
        if ie - is == 1 {
            let mut p = is;
            for level in (lv + 1) as usize..self.depth {
                let sbv = &self.levels[level];
                let z = self.zeros[level];
                p = if p < z {
                    sbv.select0(p)
                } else {
                    sbv.select1(p - z)
                };
            }
            out.add_root(p, p + 1);
            return;
        }

        let (mut child, mut parent) = (work1, work2);
        child.clear();
        parent.clear();
        child.push(is as u32);
        child.push(ie as u32);

        for level in (lv + 1) as usize..self.depth {
            let sbv = &self.levels[level];
            let z = self.zeros[level];
            if (child.get(0) as usize) < z {
                sbv.select_ranges0(child, 0, child.len(), 0, parent);
            } else {
                sbv.select_ranges1(child, 0, child.len(), z, parent);
            }
            core::mem::swap(&mut child, &mut parent);
            parent.clear();
        }

        let mut i = 0;
        while i < child.len() {
            out.add_root(child.get(i) as usize, child.get(i + 1) as usize);
            i += 2;
        }
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        self.levels.iter().map(|l| l.heap_bits()).sum()
    }

    #[inline]
    fn check_range(&self, s: usize, e: usize) {
        assert!(s <= e && e <= self.len, "bad range [{}, {})", s, e);
    }
}
