//! Dense succinct bit-vector with constant-time rank.
//!
//! The bit sequence is kept verbatim in `u64` words with a two-level rank
//! directory on top:
//!
//! - **Large blocks**: absolute rank every 32768 bits, one `u32` each.
//! - **Mid blocks**: rank delta from the enclosing large block every
//!   256 bits, one `u16` each.
//!
//! `rank1` is two array reads plus at most four word popcounts. Select
//! samples every 2^t-th occurrence (t chosen so the sample table stays at
//! or below len/256 entries), binary-searches mid blocks between two
//! samples, and finishes with an in-word select. Very sparse directions
//! skip sampling and store every position outright.

#[cfg(not(test))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::buf::BitBuf;
use crate::util::broadword::select_in_word;

/// Bits per mid block.
const MID_BITS: usize = 256;

/// Words per mid block.
const MID_WORDS: usize = MID_BITS / 64;

/// Mid blocks per large block (32768 bits).
const MIDS_PER_LARGE: usize = 128;

/// Select acceleration for one bit direction.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum SelectDir {
    /// Few occurrences: every position stored.
    Positions(Vec<u32>),
    /// Sampled: mid-block index of every 2^shift-th occurrence.
    Sampled { shift: u32, blocks: Vec<u32> },
}

/// Dense bit-vector with O(1) rank and near-constant select.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DenseBits {
    words: Vec<u64>,
    len: usize,
    ones: usize,
    large: Vec<u32>,
    mid: Vec<u16>,
    sel0: SelectDir,
    sel1: SelectDir,
}

impl DenseBits {
    /// Freeze a bit buffer into a dense vector.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is empty.
    pub fn build(buf: &BitBuf) -> Self {
        let len = buf.len();
        assert!(len > 0, "empty bit sequence");
        let n_blocks = len.div_ceil(MID_BITS);

        let mut words = buf.words().to_vec();
        words.resize(n_blocks * MID_WORDS, 0);

        let mut large = Vec::with_capacity(n_blocks.div_ceil(MIDS_PER_LARGE));
        let mut mid = Vec::with_capacity(n_blocks);
        let mut rank = 0usize;
        for j in 0..n_blocks {
            if j % MIDS_PER_LARGE == 0 {
                large.push(rank as u32);
            }
            mid.push((rank - *large.last().unwrap() as usize) as u16);
            for w in &words[j * MID_WORDS..(j + 1) * MID_WORDS] {
                rank += w.count_ones() as usize;
            }
        }
        let ones = rank;

        let mut this = Self {
            words,
            len,
            ones,
            large,
            mid,
            sel0: SelectDir::Positions(Vec::new()),
            sel1: SelectDir::Positions(Vec::new()),
        };
        this.sel1 = this.build_select(true);
        this.sel0 = this.build_select(false);
        this
    }

    /// Length in bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector has length zero (never, by construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total one bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    /// Total zero bits.
    #[inline]
    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    /// The bit at position `i`.
    #[inline]
    pub fn get(&self, i: usize) -> bool {
        assert!(i < self.len, "position out of range: {}", i);
        (self.words[i >> 6] >> (i & 63)) & 1 == 1
    }

    /// Number of one bits in positions `[0, i)`.
    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        assert!(i <= self.len, "position out of range: {}", i);
        if i == self.len {
            return self.ones;
        }
        let j = i >> 8;
        let mut r = self.large[j >> 7] as usize + self.mid[j] as usize;
        let w = i >> 6;
        for x in j * MID_WORDS..w {
            r += self.words[x].count_ones() as usize;
        }
        let rem = i & 63;
        if rem != 0 {
            r += (self.words[w] & ((1u64 << rem) - 1)).count_ones() as usize;
        }
        r
    }

    /// Number of zero bits in positions `[0, i)`.
    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i - self.rank1(i)
    }

    /// Position of the (i+1)-th one bit.
    ///
    /// # Panics
    ///
    /// Panics if fewer than i+1 one bits exist.
    pub fn select1(&self, i: usize) -> usize {
        assert!(i < self.ones, "select1 out of range: {}", i);
        match &self.sel1 {
            SelectDir::Positions(pos) => pos[i] as usize,
            SelectDir::Sampled { shift, blocks } => {
                let block = self.locate_block(i, *shift, blocks, |s, j| s.rank_at_block(j));
                let mut rem = i - self.rank_at_block(block);
                let mut w = block * MID_WORDS;
                loop {
                    let pop = self.words[w].count_ones() as usize;
                    if rem < pop {
                        return w * 64 + select_in_word(self.words[w], rem as u32) as usize;
                    }
                    rem -= pop;
                    w += 1;
                }
            }
        }
    }

    /// Position of the (i+1)-th zero bit.
    ///
    /// # Panics
    ///
    /// Panics if fewer than i+1 zero bits exist.
    pub fn select0(&self, i: usize) -> usize {
        assert!(i < self.count_zeros(), "select0 out of range: {}", i);
        match &self.sel0 {
            SelectDir::Positions(pos) => pos[i] as usize,
            SelectDir::Sampled { shift, blocks } => {
                let block = self.locate_block(i, *shift, blocks, |s, j| {
                    j * MID_BITS - s.rank_at_block(j)
                });
                let mut rem = i - (block * MID_BITS - self.rank_at_block(block));
                let mut w = block * MID_WORDS;
                loop {
                    let pop = self.words[w].count_zeros() as usize;
                    if rem < pop {
                        return w * 64 + select_in_word(!self.words[w], rem as u32) as usize;
                    }
                    rem -= pop;
                    w += 1;
                }
            }
        }
    }

    /// Position of the first one bit strictly after `i`.
    ///
    /// The caller must know one exists; scans up to eight words, then
    /// falls back to rank + select.
    pub(crate) fn next1(&self, i: usize) -> usize {
        let j = i + 1;
        assert!(j < self.len, "next1 past the end: {}", i);
        let mut base = j & !63;
        let mut w = self.words[base >> 6] & (!0u64 << (j & 63));
        let mut loops = 0;
        loop {
            if w != 0 {
                return base + w.trailing_zeros() as usize;
            }
            base += 64;
            loops += 1;
            if loops >= 8 || base >= self.words.len() * 64 {
                return self.select1(self.rank1(j));
            }
            w = self.words[base >> 6];
        }
    }

    /// Position of the first zero bit strictly after `i`.
    pub(crate) fn next0(&self, i: usize) -> usize {
        let j = i + 1;
        assert!(j < self.len, "next0 past the end: {}", i);
        let mut base = j & !63;
        let mut w = !self.words[base >> 6] & (!0u64 << (j & 63));
        let mut loops = 0;
        loop {
            if w != 0 {
                return base + w.trailing_zeros() as usize;
            }
            base += 64;
            loops += 1;
            if loops >= 8 || base >= self.words.len() * 64 {
                return self.select0(self.rank0(j));
            }
            w = !self.words[base >> 6];
        }
    }

    /// Position of the last one bit strictly before `i`.
    pub(crate) fn prev1(&self, i: usize) -> usize {
        assert!(i >= 1 && i <= self.len, "prev1 before the start: {}", i);
        let j = i - 1;
        let mut base = j & !63;
        let mut w = self.words[base >> 6] & (!0u64 >> (63 - (j & 63)));
        let mut loops = 0;
        loop {
            if w != 0 {
                return base + 63 - w.leading_zeros() as usize;
            }
            loops += 1;
            if loops >= 8 || base == 0 {
                return self.select1(self.rank1(i) - 1);
            }
            base -= 64;
            w = self.words[base >> 6];
        }
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        let sel = |d: &SelectDir| match d {
            SelectDir::Positions(p) => p.len() * 32,
            SelectDir::Sampled { blocks, .. } => blocks.len() * 32,
        };
        self.words.len() * 64
            + self.large.len() * 32
            + self.mid.len() * 16
            + sel(&self.sel0)
            + sel(&self.sel1)
    }

    /// Rank of one bits before mid block `j` (`j` may equal the block count).
    #[inline]
    fn rank_at_block(&self, j: usize) -> usize {
        if j == self.mid.len() {
            return self.ones;
        }
        self.large[j >> 7] as usize + self.mid[j] as usize
    }

    /// Binary-search the mid block holding the (i+1)-th occurrence, between
    /// two consecutive samples.
    fn locate_block(
        &self,
        i: usize,
        shift: u32,
        blocks: &[u32],
        cum: impl Fn(&Self, usize) -> usize,
    ) -> usize {
        let mut lo = blocks[i >> shift] as usize;
        let mut hi = blocks[(i >> shift) + 1] as usize + 1;
        // First block whose cumulative count exceeds i, minus one.
        while lo < hi {
            let m = lo + (hi - lo) / 2;
            if cum(self, m) <= i {
                lo = m + 1;
            } else {
                hi = m;
            }
        }
        lo - 1
    }

    /// Build the select structure for one direction.
    fn build_select(&self, ones_dir: bool) -> SelectDir {
        let count = if ones_dir { self.ones } else { self.count_zeros() };
        let len = self.len;

        let mut shift = 0u32;
        let mut elements = count;
        loop {
            if elements < (len >> 8) {
                break;
            }
            shift += 1;
            elements = (count + (1usize << shift) - 1) >> shift;
            if shift >= 30 {
                break;
            }
        }

        if shift == 0 {
            // Sparse direction: store every position.
            let mut pos = Vec::with_capacity(count);
            for (w, &word) in self.words.iter().enumerate() {
                let mut bits = if ones_dir { word } else { !word };
                if !ones_dir && (w + 1) * 64 > len {
                    // Mask out the zero padding past the logical end.
                    let valid = len - w * 64;
                    bits &= if valid == 64 { !0 } else { (1u64 << valid) - 1 };
                }
                while bits != 0 {
                    pos.push((w * 64 + bits.trailing_zeros() as usize) as u32);
                    bits &= bits - 1;
                }
            }
            debug_assert_eq!(pos.len(), count);
            return SelectDir::Positions(pos);
        }

        let n_blocks = self.mid.len();
        let mut blocks = Vec::with_capacity(elements + 1);
        let mut j = 0usize;
        for s in 0..=elements {
            let sample = (s as u64) << shift;
            while j <= n_blocks {
                let cum = if ones_dir {
                    self.rank_at_block(j.min(n_blocks))
                } else {
                    j.min(n_blocks) * MID_BITS - self.rank_at_block(j.min(n_blocks))
                };
                if j == n_blocks || cum as u64 > sample {
                    break;
                }
                j += 1;
            }
            blocks.push(j.saturating_sub(1) as u32);
        }
        SelectDir::Sampled { shift, blocks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn from_bools(bits: &[bool]) -> DenseBits {
        let mut buf = BitBuf::new();
        for &b in bits {
            buf.push(b);
        }
        DenseBits::build(&buf)
    }

    fn check_against_naive(bits: &[bool]) {
        let dv = from_bools(bits);
        assert_eq!(dv.len(), bits.len());
        let ones: usize = bits.iter().filter(|&&b| b).count();
        assert_eq!(dv.count_ones(), ones);

        let mut r1 = 0;
        for (i, &b) in bits.iter().enumerate() {
            assert_eq!(dv.get(i), b, "access at {}", i);
            assert_eq!(dv.rank1(i), r1, "rank1 at {}", i);
            if b {
                assert_eq!(dv.select1(r1), i, "select1 at rank {}", r1);
                r1 += 1;
            } else {
                assert_eq!(dv.select0(i - r1), i, "select0 at rank {}", i - r1);
            }
        }
        assert_eq!(dv.rank1(bits.len()), ones);
    }

    #[test]
    fn test_single_bit() {
        check_against_naive(&[true]);
        check_against_naive(&[false]);
    }

    #[test]
    fn test_alternating() {
        let bits: Vec<bool> = (0..1000).map(|i| i % 2 == 0).collect();
        check_against_naive(&bits);
    }

    #[test]
    fn test_random_densities() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for &density in &[0.01, 0.3, 0.5, 0.9, 0.99] {
            let bits: Vec<bool> = (0..5000).map(|_| rng.gen_bool(density)).collect();
            check_against_naive(&bits);
        }
    }

    #[test]
    fn test_large_block_boundary() {
        // Cross the 32768-bit large-block boundary.
        let bits: Vec<bool> = (0..70_000).map(|i| i % 7 == 0).collect();
        let dv = from_bools(&bits);
        let ones = bits.iter().filter(|&&b| b).count();
        assert_eq!(dv.count_ones(), ones);
        for &i in &[0usize, 255, 256, 32767, 32768, 32769, 65535, 69_999] {
            let naive: usize = bits[..i].iter().filter(|&&b| b).count();
            assert_eq!(dv.rank1(i), naive, "rank1({})", i);
        }
        for r in (0..ones).step_by(997) {
            let pos = dv.select1(r);
            assert!(bits[pos]);
            assert_eq!(dv.rank1(pos), r);
        }
    }

    #[test]
    fn test_next_prev() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let bits: Vec<bool> = (0..4000).map(|_| rng.gen_bool(0.2)).collect();
        let dv = from_bools(&bits);
        for i in 0..bits.len() - 1 {
            if let Some(expect) = bits[i + 1..].iter().position(|&b| b) {
                assert_eq!(dv.next1(i), i + 1 + expect, "next1({})", i);
            }
            if let Some(expect) = bits[i + 1..].iter().position(|&b| !b) {
                assert_eq!(dv.next0(i), i + 1 + expect, "next0({})", i);
            }
        }
        for i in 1..bits.len() {
            if let Some(expect) = bits[..i].iter().rposition(|&b| b) {
                assert_eq!(dv.prev1(i), expect, "prev1({})", i);
            }
        }
    }

    #[test]
    fn test_positions_mode_for_rare_bits() {
        // Around 100 ones in 100k bits stays under the len/256 threshold,
        // so select1 stores every position outright.
        let mut bits = vec![false; 100_000];
        let mut i = 13;
        while i < bits.len() {
            bits[i] = true;
            i += 997;
        }
        let dv = from_bools(&bits);
        let mut rank = 0;
        for (pos, &b) in bits.iter().enumerate() {
            if b {
                assert_eq!(dv.select1(rank), pos);
                rank += 1;
            }
        }
        assert_eq!(dv.count_ones(), rank);
        assert_eq!(dv.select0(0), 0);
        assert_eq!(dv.select0(13), 14);
    }

    #[test]
    #[should_panic(expected = "select1 out of range")]
    fn test_select_past_population_panics() {
        let dv = from_bools(&[true, false, true]);
        dv.select1(2);
    }
}
