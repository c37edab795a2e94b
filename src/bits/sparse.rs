//! Sparse bit-vector variants.
//!
//! Instead of storing the bit sequence, these store the positions of the
//! minority bit in a [`Monotone`] sequence. `Sparse1Bits` records one
//! positions, `Sparse0Bits` records zero positions; every operation on the
//! opposite bit falls out of the identity `select_b(i) = i + r`, with `r`
//! the number of opposite bits before the answer.

#[cfg(not(test))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::buf::BitBuf;
use crate::intervals::IntBuf;
use crate::monotone::Monotone;

/// Bit-vector storing the positions of its one bits.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sparse1Bits {
    len: usize,
    ones: usize,
    index: Option<Monotone>,
}

impl Sparse1Bits {
    /// Freeze a bit buffer.
    pub fn build(buf: &BitBuf) -> Self {
        let len = buf.len();
        assert!(len > 0, "empty bit sequence");
        let positions = collect_positions(buf, true);
        let ones = positions.len();
        let index = if ones > 0 {
            Some(Monotone::build(&positions))
        } else {
            None
        };
        Self { len, ones, index }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    #[inline]
    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "position out of range: {}", i);
        match &self.index {
            Some(index) => index.contains(i as u32),
            None => false,
        }
    }

    pub fn rank1(&self, i: usize) -> usize {
        assert!(i <= self.len, "position out of range: {}", i);
        match &self.index {
            Some(index) => index.ranklt(i as u32),
            None => 0,
        }
    }

    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i - self.rank1(i)
    }

    pub fn select1(&self, i: usize) -> usize {
        assert!(i < self.ones, "select1 out of range: {}", i);
        self.index.as_ref().unwrap().access(i) as usize
    }

    /// Position of the (i+1)-th zero: `i` plus the count of ones before it.
    pub fn select0(&self, i: usize) -> usize {
        assert!(i < self.count_zeros(), "select0 out of range: {}", i);
        let index = match &self.index {
            Some(index) => index,
            None => return i,
        };
        i + stored_before_gap(index, self.ones, i)
    }

    /// Batched select over runs of stored one positions.
    pub(crate) fn select_ranges1(&self, se: &IntBuf, begin: usize, end: usize, bias: usize, out: &mut IntBuf) {
        let index = match &self.index {
            Some(index) => index,
            None => return,
        };
        emit_position_runs(index, se, begin, end, bias, out);
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.heap_bits())
    }
}

/// Bit-vector storing the positions of its zero bits.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sparse0Bits {
    len: usize,
    zeros: usize,
    index: Option<Monotone>,
}

impl Sparse0Bits {
    /// Freeze a bit buffer.
    pub fn build(buf: &BitBuf) -> Self {
        let len = buf.len();
        assert!(len > 0, "empty bit sequence");
        let positions = collect_positions(buf, false);
        let zeros = positions.len();
        let index = if zeros > 0 {
            Some(Monotone::build(&positions))
        } else {
            None
        };
        Self { len, zeros, index }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.len - self.zeros
    }

    #[inline]
    pub fn count_zeros(&self) -> usize {
        self.zeros
    }

    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "position out of range: {}", i);
        match &self.index {
            Some(index) => !index.contains(i as u32),
            None => true,
        }
    }

    pub fn rank0(&self, i: usize) -> usize {
        assert!(i <= self.len, "position out of range: {}", i);
        match &self.index {
            Some(index) => index.ranklt(i as u32),
            None => 0,
        }
    }

    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        i - self.rank0(i)
    }

    pub fn select0(&self, i: usize) -> usize {
        assert!(i < self.zeros, "select0 out of range: {}", i);
        self.index.as_ref().unwrap().access(i) as usize
    }

    /// Position of the (i+1)-th one: `i` plus the count of zeros before it.
    pub fn select1(&self, i: usize) -> usize {
        assert!(i < self.count_ones(), "select1 out of range: {}", i);
        let index = match &self.index {
            Some(index) => index,
            None => return i,
        };
        i + stored_before_gap(index, self.zeros, i)
    }

    /// Batched select over runs of stored zero positions.
    pub(crate) fn select_ranges0(&self, se: &IntBuf, begin: usize, end: usize, bias: usize, out: &mut IntBuf) {
        let index = match &self.index {
            Some(index) => index,
            None => return,
        };
        emit_position_runs(index, se, begin, end, bias, out);
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.heap_bits())
    }
}

fn collect_positions(buf: &BitBuf, ones: bool) -> Vec<u32> {
    let len = buf.len();
    let mut positions = Vec::new();
    for (w, &word) in buf.words().iter().enumerate() {
        let mut bits = if ones { word } else { !word };
        if !ones && (w + 1) * 64 > len {
            let valid = len - w * 64;
            bits &= if valid == 64 { !0 } else { (1u64 << valid) - 1 };
        }
        while bits != 0 {
            positions.push((w * 64 + bits.trailing_zeros() as usize) as u32);
            bits &= bits - 1;
        }
    }
    positions
}

/// Number of stored positions before the (i+1)-th absent position.
///
/// With stored positions `p_0 < p_1 < ...`, the count of absent positions
/// before `p_l` is `p_l - l`; the answer is the smallest `l` whose run of
/// stored positions has moved past the i-th gap.
fn stored_before_gap(index: &Monotone, stored: usize, i: usize) -> usize {
    let (mut lo, mut hi) = (0usize, stored);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if index.access(mid) as usize - mid <= i {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Expand rank spans over the stored positions into maximal position runs.
fn emit_position_runs(
    index: &Monotone,
    se: &IntBuf,
    begin: usize,
    end: usize,
    bias: usize,
    out: &mut IntBuf,
) {
    debug_assert!(begin % 2 == 0 && end % 2 == 0);
    let mut j = begin;
    while j < end {
        let s = se.get(j) as usize - bias;
        let e = se.get(j + 1) as usize - bias;
        j += 2;
        if s >= e {
            continue;
        }
        let (first, mut cur) = index.seq_start(s);
        let mut run_start = first;
        let mut prev = first;
        for _ in s + 1..e {
            let pos = index.seq_next(&mut cur);
            if pos != prev + 1 {
                out.push(run_start);
                out.push(prev + 1);
                run_start = pos;
            }
            prev = pos;
        }
        out.push(run_start);
        out.push(prev + 1);
    }
}
