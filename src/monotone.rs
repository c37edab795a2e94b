//! Compressed storage for a non-decreasing integer sequence.
//!
//! Elias-Fano flavour: each value minus the first is split into a high
//! and a low half at `bl = max(0, bits(span) - bits(m - 1))` bits. Low
//! halves go into a fixed-width packed array; high halves become a
//! unary-gap dense bit-vector (one 1 per element, preceded by as many 0s
//! as the high delta). `access`, `contains`, `ranklt` and `find` all run
//! in (near) constant time on top of the dense vector's rank/select.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bits::{BitBuf, DenseBits, PackedInts};

/// Compressed non-decreasing `u32` sequence.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Monotone {
    len: usize,
    first: u32,
    last: u32,
    low_width: u32,
    lows: Option<PackedInts>,
    highs: DenseBits,
    /// Number of zero bits in `highs` = span >> low_width.
    high_zeros: u32,
}

impl Monotone {
    /// Compress a sorted sequence.
    ///
    /// # Panics
    ///
    /// Panics if `values` is empty or not non-decreasing.
    pub fn build(values: &[u32]) -> Self {
        assert!(!values.is_empty(), "empty sequence");
        let len = values.len();
        let first = values[0];
        let last = values[len - 1];
        assert!(first <= last, "sequence not monotone");

        let span = last - first;
        let bm = bits_for(len as u32 - 1);
        let bn = if span == 0 { 1 } else { bits_for(span) };
        let low_width = bn.saturating_sub(bm);
        let high_zeros = if low_width == 0 { span } else { span >> low_width };

        let mut lows = if low_width > 0 {
            Some(PackedInts::new(len, low_width))
        } else {
            None
        };
        let mut high_buf = BitBuf::with_capacity(len + high_zeros as usize);

        let mut prev = first;
        let mut prev_high = 0u32;
        for (i, &v) in values.iter().enumerate() {
            assert!(prev <= v, "sequence not monotone at {}", i);
            let displacement = v - first;
            if let Some(lows) = lows.as_mut() {
                lows.set(i, displacement & ((1u32 << low_width) - 1));
            }
            let high = if low_width == 0 {
                displacement
            } else {
                displacement >> low_width
            };
            high_buf.push_zeros((high - prev_high) as usize);
            high_buf.push(true);
            prev = v;
            prev_high = high;
        }

        Self {
            len,
            first,
            last,
            low_width,
            lows,
            highs: DenseBits::build(&high_buf),
            high_zeros,
        }
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the sequence holds no elements (never, by construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Smallest stored value.
    #[inline]
    pub fn first(&self) -> u32 {
        self.first
    }

    /// Largest stored value.
    #[inline]
    pub fn last(&self) -> u32 {
        self.last
    }

    /// The value at index `i`.
    #[inline]
    pub fn access(&self, i: usize) -> u32 {
        assert!(i < self.len, "index out of range: {}", i);
        let high = (self.highs.select1(i) - i) as u32;
        self.rebuild(i, high)
    }

    /// Number of stored elements strictly less than `v`.
    pub fn ranklt(&self, v: u32) -> usize {
        if v <= self.first {
            return 0;
        }
        let c = v - self.first;
        let ch = if self.low_width == 0 {
            c
        } else {
            c >> self.low_width
        };
        if self.high_zeros < ch {
            return self.len;
        }

        let (s_l, present) = self.high_group_start(ch);
        if !present {
            return s_l;
        }
        if self.low_width == 0 {
            return s_l;
        }
        let e_l = self.high_group_end(ch);
        let cl = c & ((1u32 << self.low_width) - 1);
        self.lows.as_ref().unwrap().lower_bound(s_l, e_l, cl)
    }

    /// True if `v` occurs in the sequence.
    pub fn contains(&self, v: u32) -> bool {
        self.find(v).is_ok()
    }

    /// Search for `v`: `Ok(first occurrence)` or `Err(insertion point)`.
    pub fn find(&self, v: u32) -> Result<usize, usize> {
        if v < self.first {
            return Err(0);
        }
        if v == self.first {
            return Ok(0);
        }
        let c = v - self.first;
        let ch = if self.low_width == 0 {
            c
        } else {
            c >> self.low_width
        };
        if self.high_zeros < ch {
            return Err(self.len);
        }

        let (s_l, present) = self.high_group_start(ch);
        if !present {
            return Err(s_l);
        }
        if self.low_width == 0 {
            return Ok(s_l);
        }
        let e_l = self.high_group_end(ch);
        let cl = c & ((1u32 << self.low_width) - 1);
        self.lows.as_ref().unwrap().find(s_l, e_l, cl)
    }

    /// Start reading sequentially at index `i`.
    pub(crate) fn seq_start(&self, i: usize) -> (u32, SeqCursor) {
        assert!(i < self.len, "index out of range: {}", i);
        let sel = self.highs.select1(i);
        (self.rebuild(i, (sel - i) as u32), SeqCursor { idx: i, sel })
    }

    /// Read the element after the cursor position.
    pub(crate) fn seq_next(&self, cur: &mut SeqCursor) -> u32 {
        cur.sel = self.highs.next1(cur.sel);
        cur.idx += 1;
        self.rebuild(cur.idx, (cur.sel - cur.idx) as u32)
    }

    /// Read the element before the cursor position.
    #[allow(dead_code)]
    pub(crate) fn seq_prev(&self, cur: &mut SeqCursor) -> u32 {
        cur.sel = self.highs.prev1(cur.sel);
        cur.idx -= 1;
        self.rebuild(cur.idx, (cur.sel - cur.idx) as u32)
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        self.highs.heap_bits() + self.lows.as_ref().map_or(0, |l| l.heap_bits())
    }

    #[inline]
    fn rebuild(&self, i: usize, high: u32) -> u32 {
        if self.low_width == 0 {
            return self.first + high;
        }
        let low = self.lows.as_ref().unwrap().get(i);
        self.first + ((high << self.low_width) | low)
    }

    /// Index of the first element whose high half is `ch` and whether any
    /// element actually has that high half. Requires `ch <= high_zeros`.
    fn high_group_start(&self, ch: u32) -> (usize, bool) {
        if ch == 0 {
            // The high vector starts with a 1 exactly when some element has
            // high half zero.
            return (0, self.highs.get(0));
        }
        let pos = self.highs.select0(ch as usize - 1) + 1;
        let s_l = pos - ch as usize;
        // A trailing 1 after the ch-th zero means the group is non-empty;
        // the high vector always ends in a 1, so `pos` is in range.
        (s_l, self.highs.get(pos))
    }

    /// One past the index of the last element whose high half is `ch`.
    fn high_group_end(&self, ch: u32) -> usize {
        if self.high_zeros == ch {
            self.len
        } else {
            self.highs.select0(ch as usize) - ch as usize
        }
    }
}

/// Cursor state for sequential access.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SeqCursor {
    idx: usize,
    sel: usize,
}

fn bits_for(v: u32) -> u32 {
    32 - v.leading_zeros()
}
