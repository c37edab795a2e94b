//! Per-dimension rank-space dictionary.
//!
//! Maps reals to dense ranks (`1223`-style competition-free ranks over
//! the distinct values) and back. Reals are canonicalised through the
//! order-preserving [`encode`](crate::util::float::encode) so searches
//! are integer comparisons; absent values rank at their insertion point.
//!
//! Two physical encodings, chosen by estimated size at build time: a
//! plain sorted key array, or an Elias-Fano split when the keys cluster
//! tightly enough for it to win. All displacement arithmetic runs in
//! `u64` so dictionaries spanning the full double range stay exact.

#[cfg(not(test))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::{BitBuf, DenseBits, PackedInts64};
use crate::util::float::{decode, encode};

/// Rank-space dictionary for one dimension.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) enum RankDict {
    Plain(PlainDict),
    Packed(PackedDict),
}

impl RankDict {
    /// Build from one dimension's coordinates (any order, duplicates fine).
    ///
    /// Callers validate finiteness; this sorts the encoded keys and picks
    /// the smaller physical encoding.
    pub fn build(values: &[f64]) -> Self {
        assert!(!values.is_empty(), "empty dictionary input");
        let mut keys: Vec<i64> = values.iter().map(|&v| encode(v)).collect();
        keys.sort_unstable();

        let mut cardinality = 1usize;
        for pair in keys.windows(2) {
            if pair[0] != pair[1] {
                cardinality += 1;
            }
        }

        let first = keys[0];
        let last = keys[keys.len() - 1];
        let plain_bits = 96u128 * cardinality as u128;
        let packed_bits = PackedDict::estimate_bits(cardinality, first, last);
        if plain_bits <= packed_bits {
            Self::Plain(PlainDict::from_sorted(&keys, cardinality))
        } else {
            Self::Packed(PackedDict::from_sorted(&keys, cardinality))
        }
    }

    /// Dense rank of `v`: the matching rank when stored, otherwise the
    /// rank of the smallest stored value greater than `v`.
    #[inline]
    pub fn rank_of(&self, v: f64) -> usize {
        match self {
            Self::Plain(d) => d.rank_of_key(encode(v)),
            Self::Packed(d) => d.rank_of_key(encode(v)),
        }
    }

    /// The real value holding dense rank `r`.
    #[inline]
    pub fn value_of(&self, r: usize) -> f64 {
        match self {
            Self::Plain(d) => d.value_of(r),
            Self::Packed(d) => d.value_of(r),
        }
    }

    /// Largest dense rank, i.e. cardinality - 1.
    #[inline]
    pub fn max_rank(&self) -> usize {
        match self {
            Self::Plain(d) => d.keys.len() - 1,
            Self::Packed(d) => d.cardinality - 1,
        }
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        match self {
            Self::Plain(d) => d.keys.len() * 64,
            Self::Packed(d) => {
                d.highs.heap_bits() + d.lows.as_ref().map_or(0, |l| l.heap_bits())
            }
        }
    }
}

/// Sorted distinct keys, searched directly.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct PlainDict {
    keys: Vec<i64>,
}

impl PlainDict {
    fn from_sorted(sorted: &[i64], cardinality: usize) -> Self {
        let mut keys = Vec::with_capacity(cardinality);
        keys.push(sorted[0]);
        for pair in sorted.windows(2) {
            if pair[0] != pair[1] {
                keys.push(pair[1]);
            }
        }
        debug_assert_eq!(keys.len(), cardinality);
        Self { keys }
    }

    #[inline]
    fn rank_of_key(&self, key: i64) -> usize {
        match self.keys.binary_search(&key) {
            Ok(i) | Err(i) => i,
        }
    }

    #[inline]
    fn value_of(&self, r: usize) -> f64 {
        decode(self.keys[r])
    }
}

/// Elias-Fano encoding over the distinct keys.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct PackedDict {
    cardinality: usize,
    first: i64,
    low_width: u32,
    lows: Option<PackedInts64>,
    highs: DenseBits,
    high_zeros: u64,
}

impl PackedDict {
    fn split(cardinality: usize, first: i64, last: i64) -> (u32, u64) {
        // Displacements are exact in u64 even when the keys span the full
        // signed range.
        let span = last.wrapping_sub(first) as u64;
        let bm = 64 - (cardinality as u64 - 1).leading_zeros();
        let bn = if span == 0 {
            1
        } else {
            64 - span.leading_zeros()
        };
        let low_width = bn.saturating_sub(bm);
        (low_width, span >> low_width)
    }

    fn estimate_bits(cardinality: usize, first: i64, last: i64) -> u128 {
        let (low_width, high_zeros) = Self::split(cardinality, first, last);
        cardinality as u128 * low_width as u128 + cardinality as u128 + high_zeros as u128
    }

    fn from_sorted(sorted: &[i64], cardinality: usize) -> Self {
        let first = sorted[0];
        let (low_width, high_zeros) = Self::split(cardinality, first, sorted[sorted.len() - 1]);

        let mut lows = if low_width > 0 {
            Some(PackedInts64::new(cardinality, low_width))
        } else {
            None
        };
        let mut high_buf = BitBuf::with_capacity(cardinality + high_zeros as usize);

        let mut rank = 0usize;
        let mut prev = None;
        let mut prev_high = 0u64;
        for &key in sorted {
            if prev == Some(key) {
                continue;
            }
            let displacement = key.wrapping_sub(first) as u64;
            if let Some(lows) = lows.as_mut() {
                lows.set(rank, displacement & low_mask(low_width));
            }
            let high = if low_width == 0 {
                displacement
            } else {
                displacement >> low_width
            };
            high_buf.push_zeros((high - prev_high) as usize);
            high_buf.push(true);
            prev = Some(key);
            prev_high = high;
            rank += 1;
        }
        debug_assert_eq!(rank, cardinality);

        Self {
            cardinality,
            first,
            low_width,
            lows,
            highs: DenseBits::build(&high_buf),
            high_zeros,
        }
    }

    fn rank_of_key(&self, key: i64) -> usize {
        if key <= self.first {
            return 0;
        }
        let c = key.wrapping_sub(self.first) as u64;
        let ch = if self.low_width == 0 {
            c
        } else {
            c >> self.low_width
        };
        if self.high_zeros < ch {
            return self.cardinality;
        }

        let (s_l, present) = if ch == 0 {
            (0usize, self.highs.get(0))
        } else {
            let pos = self.highs.select0(ch as usize - 1) + 1;
            (pos - ch as usize, self.highs.get(pos))
        };
        if !present || self.low_width == 0 {
            return s_l;
        }
        let e_l = if self.high_zeros == ch {
            self.cardinality
        } else {
            self.highs.select0(ch as usize) - ch as usize
        };
        let cl = c & low_mask(self.low_width);
        self.lows.as_ref().unwrap().lower_bound(s_l, e_l, cl)
    }

    fn value_of(&self, r: usize) -> f64 {
        assert!(r < self.cardinality, "rank out of range: {}", r);
        let high = (self.highs.select1(r) - r) as u64;
        let displacement = match &self.lows {
            Some(lows) => (high << self.low_width) | lows.get(r),
            None => high,
        };
        decode(self.first.wrapping_add(displacement as i64))
    }
}

#[inline]
fn low_mask(width: u32) -> u64 {
    if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
