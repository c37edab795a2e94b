//! Succinct bit-vector family.
//!
//! Seven interchangeable representations behind one sum type: the
//! mandatory [`DenseBits`] plus size optimisations picked at build time
//! by the [`SizeEstimator`]. All variants answer the same contract with
//! identical results: `get`, `rank0`/`rank1`, `select0`/`select1`,
//! nearest-occurrence walks and the batched `select_ranges` primitive.
//!
//! Tagged dispatch is deliberate: the variant set is closed and the
//! query loops are hot, so an enum beats trait objects here.

pub mod biased;
pub mod buf;
pub mod dense;
pub mod estimate;
pub mod fixed;
pub mod rrr;
pub mod sparse;

pub use biased::BiasedBits;
pub use buf::BitBuf;
pub use dense::DenseBits;
pub use estimate::{BitsKind, SizeEstimator};
pub use fixed::{PackedInts, PackedInts64};
pub use rrr::RrrBits;
pub use sparse::{Sparse0Bits, Sparse1Bits};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::intervals::IntBuf;

/// A frozen bit sequence in whichever representation the estimator chose.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitVec {
    /// Every bit is zero; only the length is kept.
    AllZeros(usize),
    /// Every bit is one; only the length is kept.
    AllOnes(usize),
    Dense(DenseBits),
    Sparse0(Sparse0Bits),
    Sparse1(Sparse1Bits),
    Rrr(RrrBits),
    Biased(BiasedBits),
}

impl BitVec {
    /// Freeze `buf` into the smallest estimated representation.
    pub fn build(buf: &BitBuf) -> Self {
        match SizeEstimator::scan(buf).best() {
            BitsKind::AllZeros => BitVec::AllZeros(buf.len()),
            BitsKind::AllOnes => BitVec::AllOnes(buf.len()),
            BitsKind::Dense => BitVec::Dense(DenseBits::build(buf)),
            BitsKind::Sparse0 => BitVec::Sparse0(Sparse0Bits::build(buf)),
            BitsKind::Sparse1 => BitVec::Sparse1(Sparse1Bits::build(buf)),
            BitsKind::Rrr => BitVec::Rrr(RrrBits::build(buf)),
            BitsKind::Biased => BitVec::Biased(BiasedBits::build(buf)),
        }
    }

    /// Freeze `buf` as a dense vector, skipping the estimator.
    pub fn dense(buf: &BitBuf) -> Self {
        BitVec::Dense(DenseBits::build(buf))
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        match self {
            BitVec::AllZeros(len) | BitVec::AllOnes(len) => *len,
            BitVec::Dense(v) => v.len(),
            BitVec::Sparse0(v) => v.len(),
            BitVec::Sparse1(v) => v.len(),
            BitVec::Rrr(v) => v.len(),
            BitVec::Biased(v) => v.len(),
        }
    }

    /// True if the vector has length zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total one bits.
    pub fn count_ones(&self) -> usize {
        match self {
            BitVec::AllZeros(_) => 0,
            BitVec::AllOnes(len) => *len,
            BitVec::Dense(v) => v.count_ones(),
            BitVec::Sparse0(v) => v.count_ones(),
            BitVec::Sparse1(v) => v.count_ones(),
            BitVec::Rrr(v) => v.count_ones(),
            BitVec::Biased(v) => v.count_ones(),
        }
    }

    /// Total zero bits.
    pub fn count_zeros(&self) -> usize {
        self.len() - self.count_ones()
    }

    /// The bit at position `i`.
    pub fn get(&self, i: usize) -> bool {
        match self {
            BitVec::AllZeros(len) => {
                assert!(i < *len, "position out of range: {}", i);
                false
            }
            BitVec::AllOnes(len) => {
                assert!(i < *len, "position out of range: {}", i);
                true
            }
            BitVec::Dense(v) => v.get(i),
            BitVec::Sparse0(v) => v.get(i),
            BitVec::Sparse1(v) => v.get(i),
            BitVec::Rrr(v) => v.get(i),
            BitVec::Biased(v) => v.get(i),
        }
    }

    /// Number of one bits in positions `[0, i)`.
    pub fn rank1(&self, i: usize) -> usize {
        match self {
            BitVec::AllZeros(len) => {
                assert!(i <= *len, "position out of range: {}", i);
                0
            }
            BitVec::AllOnes(len) => {
                assert!(i <= *len, "position out of range: {}", i);
                i
            }
            BitVec::Dense(v) => v.rank1(i),
            BitVec::Sparse0(v) => v.rank1(i),
            BitVec::Sparse1(v) => v.rank1(i),
            BitVec::Rrr(v) => v.rank1(i),
            BitVec::Biased(v) => v.rank1(i),
        }
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
        match self {
            BitVec::AllZeros(_) => panic!("select1 on an all-zero vector: {}", i),
            BitVec::AllOnes(len) => {
                assert!(i < *len, "select1 out of range: {}", i);
                i
            }
            BitVec::Dense(v) => v.select1(i),
            BitVec::Sparse0(v) => v.select1(i),
            BitVec::Sparse1(v) => v.select1(i),
            BitVec::Rrr(v) => v.select1(i),
            BitVec::Biased(v) => v.select1(i),
        }
    }

    /// Position of the (i+1)-th zero bit.
    ///
    /// # Panics
    ///
    /// Panics if fewer than i+1 zero bits exist.
    pub fn select0(&self, i: usize) -> usize {
        match self {
            BitVec::AllZeros(len) => {
                assert!(i < *len, "select0 out of range: {}", i);
                i
            }
            BitVec::AllOnes(_) => panic!("select0 on an all-one vector: {}", i),
            BitVec::Dense(v) => v.select0(i),
            BitVec::Sparse0(v) => v.select0(i),
            BitVec::Sparse1(v) => v.select0(i),
            BitVec::Rrr(v) => v.select0(i),
            BitVec::Biased(v) => v.select0(i),
        }
    }

    /// Position of the first one bit strictly after `i`.
    ///
    /// The caller must guarantee one exists.
    pub(crate) fn next1(&self, i: usize) -> usize {
        match self {
            BitVec::Dense(v) => v.next1(i),
            BitVec::AllOnes(len) => {
                assert!(i + 1 < *len, "next1 past the end: {}", i);
                i + 1
            }
            _ => self.select1(self.rank1(i + 1)),
        }
    }

    /// Position of the first zero bit strictly after `i`.
    ///
    /// The caller must guarantee one exists.
    pub(crate) fn next0(&self, i: usize) -> usize {
        match self {
            BitVec::Dense(v) => v.next0(i),
            BitVec::AllZeros(len) => {
                assert!(i + 1 < *len, "next0 past the end: {}", i);
                i + 1
            }
            _ => self.select0(self.rank0(i + 1)),
        }
    }

    /// Position of the last one bit strictly before `i`.
    ///
    /// The caller must guarantee one exists.
    pub(crate) fn prev1(&self, i: usize) -> usize {
        match self {
            BitVec::Dense(v) => v.prev1(i),
            _ => self.select1(self.rank1(i) - 1),
        }
    }

    /// Batched select0: expand sorted rank spans into position intervals.
    ///
    /// `se[begin..end]` holds alternating interval endpoints over zero
    /// ranks (even index = start, odd = end); `bias` is subtracted from
    /// every endpoint first. The matching half-open intervals of zero-bit
    /// positions are appended to `out` as alternating endpoints.
    pub(crate) fn select_ranges0(
        &self,
        se: &IntBuf,
        begin: usize,
        end: usize,
        bias: usize,
        out: &mut IntBuf,
    ) {
        match self {
            BitVec::AllZeros(_) => {
                for j in begin..end {
                    out.push(se.get(j) - bias as u32);
                }
            }
            BitVec::AllOnes(_) => {}
            BitVec::Sparse0(v) => v.select_ranges0(se, begin, end, bias, out),
            _ => walk_ranges(self, false, se, begin, end, bias, out),
        }
    }

    /// Batched select1; see [`Self::select_ranges0`].
    pub(crate) fn select_ranges1(
        &self,
        se: &IntBuf,
        begin: usize,
        end: usize,
        bias: usize,
        out: &mut IntBuf,
    ) {
        match self {
            BitVec::AllZeros(_) => {}
            BitVec::AllOnes(_) => {
                for j in begin..end {
                    out.push(se.get(j) - bias as u32);
                }
            }
            BitVec::Sparse1(v) => v.select_ranges1(se, begin, end, bias, out),
            _ => walk_ranges(self, true, se, begin, end, bias, out),
        }
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        match self {
            BitVec::AllZeros(_) | BitVec::AllOnes(_) => 0,
            BitVec::Dense(v) => v.heap_bits(),
            BitVec::Sparse0(v) => v.heap_bits(),
            BitVec::Sparse1(v) => v.heap_bits(),
            BitVec::Rrr(v) => v.heap_bits(),
            BitVec::Biased(v) => v.heap_bits(),
        }
    }
}

/// Shared walker behind `select_ranges`: one leading select per span run,
/// then nearest-occurrence steps carried across consecutive endpoints.
///
/// `target` names the bit being selected. State is phrased for that bit:
/// `other` counts the opposite bit seen before the current run, and
/// `expire` is the target-rank at which the current run of target bits
/// ends. Spans must be sorted; output intervals are maximal runs of
/// target-bit positions.
fn walk_ranges(
    bv: &BitVec,
    target: bool,
    se: &IntBuf,
    begin: usize,
    end: usize,
    bias: usize,
    out: &mut IntBuf,
) {
    let total_target = if target {
        bv.count_ones()
    } else {
        bv.count_zeros()
    };
    let total_other = bv.len() - total_target;
    let select = |i: usize| if target { bv.select1(i) } else { bv.select0(i) };
    let next_target = |i: usize| if target { bv.next1(i) } else { bv.next0(i) };
    let next_other = |i: usize| if target { bv.next0(i) } else { bv.next1(i) };

    let mut expire = 0usize;
    let mut other = 0usize;
    for j in begin..end {
        let jlsb = j & 1;
        let value = se.get(j) as usize - bias - jlsb;
        if value < expire {
            // Still inside the run located by an earlier endpoint.
            out.push((other + value + jlsb) as u32);
        } else if jlsb == 0 {
            // Interval start: locate its run with one select.
            let pos = select(value);
            out.push(pos as u32);
            other = pos - value;
            expire = if other < total_other {
                value + (next_other(pos) - pos)
            } else {
                total_target
            };
        } else {
            // Interval end past the current run: walk run by run.
            let mut run_end = other + expire;
            out.push(run_end as u32);
            loop {
                let pos = next_target(run_end);
                out.push(pos as u32);
                other = pos - expire;
                if other < total_other {
                    run_end = next_other(pos);
                    expire += run_end - pos;
                } else {
                    expire = total_target;
                }
                if value < expire {
                    out.push((other + value + 1) as u32);
                    break;
                } else {
                    out.push(run_end as u32);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn freeze(bits: &[bool]) -> (BitBuf, BitVec) {
        let mut buf = BitBuf::new();
        for &b in bits {
            buf.push(b);
        }
        let bv = BitVec::build(&buf);
        (buf, bv)
    }

    fn all_variants(bits: &[bool]) -> Vec<BitVec> {
        let mut buf = BitBuf::new();
        for &b in bits {
            buf.push(b);
        }
        let mut out = vec![BitVec::Dense(DenseBits::build(&buf))];
        if bits.iter().any(|&b| b) && bits.iter().any(|&b| !b) {
            out.push(BitVec::Sparse0(Sparse0Bits::build(&buf)));
            out.push(BitVec::Sparse1(Sparse1Bits::build(&buf)));
            out.push(BitVec::Rrr(RrrBits::build(&buf)));
            out.push(BitVec::Biased(BiasedBits::build(&buf)));
        }
        out
    }

    #[test]
    fn test_variants_agree() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for &density in &[0.05, 0.4, 0.95] {
            let bits: Vec<bool> = (0..1500).map(|_| rng.gen_bool(density)).collect();
            let ones: usize = bits.iter().filter(|&&b| b).count();
            for bv in all_variants(&bits) {
                let mut r1 = 0;
                for (i, &b) in bits.iter().enumerate() {
                    assert_eq!(bv.get(i), b);
                    assert_eq!(bv.rank1(i), r1);
                    if b {
                        assert_eq!(bv.select1(r1), i);
                        r1 += 1;
                    } else {
                        assert_eq!(bv.select0(i - r1), i);
                    }
                }
                assert_eq!(bv.count_ones(), ones);
            }
        }
    }

    #[test]
    fn test_estimator_dispatch() {
        let (_, bv) = freeze(&[false; 500]);
        assert!(matches!(bv, BitVec::AllZeros(500)));
        let (_, bv) = freeze(&[true; 500]);
        assert!(matches!(bv, BitVec::AllOnes(500)));
    }

    /// `select_ranges` must agree with repeated single selects.
    fn check_select_ranges(bits: &[bool], spans: &[(usize, usize)], target: bool) {
        for bv in all_variants(bits) {
            let mut se = IntBuf::new();
            for &(s, e) in spans {
                se.push(s as u32);
                se.push(e as u32);
            }
            let mut out = IntBuf::new();
            if target {
                bv.select_ranges1(&se, 0, se.len(), 0, &mut out);
            } else {
                bv.select_ranges0(&se, 0, se.len(), 0, &mut out);
            }

            // Expand the produced intervals and compare with naive selects.
            let mut produced = Vec::new();
            let mut i = 0;
            while i < out.len() {
                let (s, e) = (out.get(i) as usize, out.get(i + 1) as usize);
                assert!(s < e, "empty interval from {:?}", bv);
                produced.extend(s..e);
                i += 2;
            }
            let mut expected = Vec::new();
            for &(s, e) in spans {
                for r in s..e {
                    expected.push(if target { bv.select1(r) } else { bv.select0(r) });
                }
            }
            assert_eq!(produced, expected, "target={} spans={:?}", target, spans);
        }
    }

    #[test]
    fn test_select_ranges_matches_selects() {
        let mut rng = ChaCha8Rng::seed_from_u64(29);
        for &density in &[0.1, 0.5, 0.9] {
            let bits: Vec<bool> = (0..800).map(|_| rng.gen_bool(density)).collect();
            let ones: usize = bits.iter().filter(|&&b| b).count();
            let zeros = bits.len() - ones;
            if ones < 10 || zeros < 10 {
                continue;
            }
            let spans1 = [(0usize, 3usize), (3, 4), (5, ones.min(40))];
            let spans0 = [(1usize, 2usize), (2, 8), (10, zeros.min(35))];
            check_select_ranges(&bits, &spans1, true);
            check_select_ranges(&bits, &spans0, false);
        }
    }

    #[test]
    fn test_select_ranges_full_range() {
        let bits: Vec<bool> = (0..300).map(|i| (i / 7) % 2 == 0).collect();
        let ones = bits.iter().filter(|&&b| b).count();
        check_select_ranges(&bits, &[(0, ones)], true);
        check_select_ranges(&bits, &[(0, bits.len() - ones)], false);
    }
}
