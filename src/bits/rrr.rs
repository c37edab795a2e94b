//! RRR-coded bit-vector with 16-bit blocks.
//!
//! Each 16-bit block is stored as a 4-bit class (its popcount) plus a
//! variable-width combinatorial offset identifying the pattern within the
//! class. A class-16 block would need a 5-bit class, so it is folded into
//! class 0 / offset 1 (class 0 otherwise only uses offset 0). Every 256
//! bits, the running rank and the offset-stream position are snapshotted
//! into monotone sequences so queries restart from a superblock boundary.

#[cfg(not(test))]
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::buf::BitBuf;
use super::fixed::PackedInts;
use crate::monotone::Monotone;
use crate::util::broadword::select_in_word;
use crate::util::tables::{rrr_offset_of, rrr_pattern_of, RRR16_OFFSET_WIDTH};

/// Blocks per superblock (256 bits / 16-bit blocks).
const BLOCKS_PER_SUPER: usize = 16;

/// RRR bit-vector (16-bit block granularity).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RrrBits {
    len: usize,
    ones: usize,
    classes: PackedInts,
    offsets: BitBuf,
    /// Offset-stream bit position at each superblock boundary.
    offset_pos: Monotone,
    /// Rank of one bits at each superblock boundary.
    ranks: Monotone,
}

impl RrrBits {
    /// Freeze a bit buffer.
    pub fn build(buf: &BitBuf) -> Self {
        let len = buf.len();
        assert!(len > 0, "empty bit sequence");
        let n_blocks = len.div_ceil(16);
        let n_supers = len.div_ceil(256);

        let mut classes = PackedInts::new(n_blocks, 4);
        let mut offsets = BitBuf::with_capacity(n_blocks * 4);
        let mut snap_pos = Vec::with_capacity(n_supers);
        let mut snap_rank = Vec::with_capacity(n_supers);

        let mut rank = 0usize;
        for b in 0..n_blocks {
            if b % BLOCKS_PER_SUPER == 0 {
                snap_pos.push(offsets.len() as u32);
                snap_rank.push(rank as u32);
            }
            let pattern = block_pattern(buf, b);
            let class = pattern.count_ones();
            classes.set(b, class & 0xf);
            let offset = if class == 16 { 1 } else { rrr_offset_of(pattern) };
            offsets.push_bits(offset as u64, RRR16_OFFSET_WIDTH[class as usize]);
            rank += class as usize;
        }
        offsets.trim();

        Self {
            len,
            ones: rank,
            classes,
            offsets,
            offset_pos: Monotone::build(&snap_pos),
            ranks: Monotone::build(&snap_rank),
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
        let (pattern, _, _) = self.decode_block_at(i >> 4);
        (pattern >> (i & 15)) & 1 == 1
    }

    pub fn rank1(&self, i: usize) -> usize {
        assert!(i <= self.len, "position out of range: {}", i);
        if i == self.len {
            return self.ones;
        }
        let block = i >> 4;
        let sb = i >> 8;
        let mut pos = self.offset_pos.access(sb) as usize;
        let mut rank = self.ranks.access(sb) as usize;
        for b in sb * BLOCKS_PER_SUPER..block {
            let (class, width) = self.class_at(b, pos);
            rank += class as usize;
            pos += width as usize;
        }
        let (pattern, _, _) = self.decode_block(block, pos);
        rank + (pattern & ((1u16 << (i & 15)) - 1)).count_ones() as usize
    }

    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        i - self.rank1(i)
    }

    pub fn select1(&self, i: usize) -> usize {
        assert!(i < self.ones, "select1 out of range: {}", i);
        // Last superblock whose starting rank is at most i.
        let sb = self.ranks.ranklt(i as u32 + 1) - 1;
        let mut pos = self.offset_pos.access(sb) as usize;
        let mut rank = self.ranks.access(sb) as usize;
        let mut b = sb * BLOCKS_PER_SUPER;
        loop {
            let (pattern, _, width) = self.decode_block(b, pos);
            let pop = pattern.count_ones() as usize;
            if rank + pop > i {
                return b * 16 + select_in_word(pattern as u64, (i - rank) as u32) as usize;
            }
            rank += pop;
            pos += width as usize;
            b += 1;
        }
    }

    pub fn select0(&self, i: usize) -> usize {
        assert!(i < self.count_zeros(), "select0 out of range: {}", i);
        // Last superblock whose starting zero-rank is at most i; zero-rank
        // at superblock s is s*256 - ranks[s], monotone in s.
        let (mut lo, mut hi) = (0usize, self.ranks.len());
        while lo < hi {
            let m = lo + (hi - lo) / 2;
            if m * 256 - self.ranks.access(m) as usize <= i {
                lo = m + 1;
            } else {
                hi = m;
            }
        }
        let sb = lo - 1;
        let mut pos = self.offset_pos.access(sb) as usize;
        let mut rank0 = sb * 256 - self.ranks.access(sb) as usize;
        let mut b = sb * BLOCKS_PER_SUPER;
        loop {
            let (pattern, _, width) = self.decode_block(b, pos);
            let pop = 16 - pattern.count_ones() as usize;
            if rank0 + pop > i {
                return b * 16 + select_in_word(!(pattern as u64) & 0xffff, (i - rank0) as u32) as usize;
            }
            rank0 += pop;
            pos += width as usize;
            b += 1;
        }
    }

    /// Heap storage in bits.
    pub fn heap_bits(&self) -> usize {
        self.classes.heap_bits()
            + self.offsets.heap_bits()
            + self.offset_pos.heap_bits()
            + self.ranks.heap_bits()
    }

    /// Class and offset width of block `b`, given its offset-stream position.
    #[inline]
    fn class_at(&self, b: usize, pos: usize) -> (u32, u32) {
        let stored = self.classes.get(b);
        let width = RRR16_OFFSET_WIDTH[stored as usize];
        // Stored class 0 covers true classes 0 and 16.
        let class = if stored == 0 && self.offsets.get_bits(pos, 1) == 1 {
            16
        } else {
            stored
        };
        (class, width)
    }

    /// Decode block `b` given its offset-stream position.
    #[inline]
    fn decode_block(&self, b: usize, pos: usize) -> (u16, u32, u32) {
        let stored = self.classes.get(b);
        let width = RRR16_OFFSET_WIDTH[stored as usize];
        let offset = self.offsets.get_bits(pos, width) as u32;
        let pattern = if stored == 0 {
            if offset == 1 {
                0xffff
            } else {
                0
            }
        } else {
            rrr_pattern_of(stored, offset)
        };
        (pattern, stored, width)
    }

    /// Decode the block containing bit `i` by walking from its superblock.
    fn decode_block_at(&self, block: usize) -> (u16, u32, u32) {
        let sb = block / BLOCKS_PER_SUPER;
        let mut pos = self.offset_pos.access(sb) as usize;
        for b in sb * BLOCKS_PER_SUPER..block {
            let width = RRR16_OFFSET_WIDTH[self.classes.get(b) as usize];
            pos += width as usize;
        }
        self.decode_block(block, pos)
    }
}

/// The 16-bit pattern of block `b`, zero-padded past the logical end.
#[inline]
fn block_pattern(buf: &BitBuf, b: usize) -> u16 {
    let pos = b * 16;
    let n = (buf.len() - pos).min(16) as u32;
    buf.get_bits(pos, n) as u16
}
