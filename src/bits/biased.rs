//! Run-encoded bit-vector for sequences with few 0-to-1 alternations.
//!
//! Only two monotone sequences are kept: the start position of every
//! 1-run (with a sentinel at the total length) and the running count of
//! one bits at each of those starts (with a sentinel at the total count).
//! Writing `T[j]` and `R1[j]` for these, the run identities give every
//! operation:
//!
//! - ones in run j: `R1[j+1] - R1[j]`
//! - zeros before run j: `T[j] - R1[j]`
//! - `select0(i) = i + R1[m]` with m the first run where `T[m] - R1[m] > i`

#[cfg(not(test))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::buf::BitBuf;
use crate::monotone::Monotone;

/// Bit-vector compressed by 1-run boundaries.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BiasedBits {
    len: usize,
    ones: usize,
    /// 1-run start positions, ending with the sentinel `len`.
    starts: Monotone,
    /// Rank of one bits at each run start, ending with the sentinel `ones`.
    ranks: Monotone,
}

impl BiasedBits {
    /// Freeze a bit buffer.
    pub fn build(buf: &BitBuf) -> Self {
        let len = buf.len();
        assert!(len > 0, "empty bit sequence");
        let mut starts = Vec::new();
        let mut ranks = Vec::new();
        let mut ones = 0usize;
        let mut prev = false;
        for i in 0..len {
            let bit = buf.get(i);
            if bit {
                if !prev {
                    starts.push(i as u32);
                    ranks.push(ones as u32);
                }
                ones += 1;
            }
            prev = bit;
        }
        starts.push(len as u32);
        ranks.push(ones as u32);
        Self {
            len,
            ones,
            starts: Monotone::build(&starts),
            ranks: Monotone::build(&ranks),
        }
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
        // Number of runs starting at or before i.
        let j = self.starts.ranklt(i as u32 + 1);
        if j == 0 {
            return false;
        }
        let t = self.starts.access(j - 1) as usize;
        let run_ones = (self.ranks.access(j) - self.ranks.access(j - 1)) as usize;
        i - t < run_ones
    }

    pub fn rank1(&self, i: usize) -> usize {
        assert!(i <= self.len, "position out of range: {}", i);
        if i == self.len {
            return self.ones;
        }
        let j = self.starts.ranklt(i as u32 + 1);
        if j == 0 {
            return 0;
        }
        let t = self.starts.access(j - 1) as usize;
        let before = self.ranks.access(j - 1) as usize;
        let run_ones = self.ranks.access(j) as usize - before;
        before + (i - t).min(run_ones)
    }

    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i - self.rank1(i)
    }

    pub fn select1(&self, i: usize) -> usize {
        assert!(i < self.ones, "select1 out of range: {}", i);
        // Last run whose starting rank is at most i.
        let j = self.ranks.ranklt(i as u32 + 1) - 1;
        self.starts.access(j) as usize + (i - self.ranks.access(j) as usize)
    }

    pub fn select0(&self, i: usize) -> usize {
        assert!(i < self.count_zeros(), "select0 out of range: {}", i);
        // First run boundary where the zero count passes i; the sentinel
        // entry guarantees one exists.
        let (mut lo, mut hi) = (0usize, self.starts.len());
        while lo < hi {
            let m = lo + (hi - lo) / 2;
            if (self.starts.access(m) - self.ranks.access(m)) as usize <= i {
                lo = m + 1;
            } else {
                hi = m;
            }
        }
        i + self.ranks.access(lo) as usize
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        self.starts.heap_bits() + self.ranks.heap_bits()
    }
}
