//! Uniform partial permutations for the sampling query.
//!
//! Draws k distinct integers uniformly from `[0, n)`. Small universes, or
//! draws taking a sizeable fraction of one, shuffle the tail of a full
//! index sequence; large sparse draws reject-sample into a hash set.
//! Either path is uniform; the split only bounds work and memory.

#[cfg(not(test))]
use alloc::vec::Vec;

use hashbrown::HashSet;
use rand::{Rng, RngCore};

/// Universe size below which the shuffle path is always used.
const SHUFFLE_LIMIT: usize = 100_000;

/// Draw `k` distinct integers uniformly from `[0, n)`.
///
/// # Panics
///
/// Panics if `k > n`.
pub(crate) fn partial_permutation<R: RngCore + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<u32> {
    assert!(k <= n, "cannot draw {} distinct values from {}", k, n);
    if n <= SHUFFLE_LIMIT || k > n >> 4 {
        shuffle_tail(n, k, rng)
    } else {
        reject_sample(n, k, rng)
    }
}

/// Fisher-Yates over the last `k` slots of `0..n`.
fn shuffle_tail<R: RngCore + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<u32> {
    let mut seq: Vec<u32> = (0..n as u32).collect();
    for j in ((n - k)..n).rev() {
        let pick = rng.gen_range(0..=j);
        seq.swap(j, pick);
    }
    seq.split_off(n - k)
}

/// Draw fresh values until `k` distinct ones have been seen.
fn reject_sample<R: RngCore + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<u32> {
    let mut seen: HashSet<u32> = HashSet::with_capacity(k);
    let mut out = Vec::with_capacity(k);
    while out.len() < k {
        let r = rng.gen_range(0..n) as u32;
        if seen.insert(r) {
            out.push(r);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn check_distinct_in_range(perm: &[u32], n: usize, k: usize) {
        assert_eq!(perm.len(), k);
        let mut sorted = perm.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), k, "duplicates drawn");
        assert!(sorted.iter().all(|&v| (v as usize) < n));
    }

    #[test]
    fn test_full_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let perm = partial_permutation(10, 10, &mut rng);
        check_distinct_in_range(&perm, 10, 10);
    }

    #[test]
    fn test_shuffle_path() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let perm = partial_permutation(5000, 17, &mut rng);
        check_distinct_in_range(&perm, 5000, 17);
    }

    #[test]
    fn test_reject_path() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let perm = partial_permutation(1_000_000, 100, &mut rng);
        check_distinct_in_range(&perm, 1_000_000, 100);
    }

    #[test]
    fn test_roughly_uniform() {
        // Over many draws of 2-of-8, each value appears about a quarter
        // of the time.
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut hits = [0usize; 8];
        let rounds = 8000;
        for _ in 0..rounds {
            for v in partial_permutation(8, 2, &mut rng) {
                hits[v as usize] += 1;
            }
        }
        let expect = rounds * 2 / 8;
        for (v, &h) in hits.iter().enumerate() {
            let deviation = (h as f64 - expect as f64).abs() / expect as f64;
            assert!(deviation < 0.1, "value {} drawn {} times", v, h);
        }
    }

    #[test]
    #[should_panic(expected = "cannot draw")]
    fn test_over_draw_panics() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        partial_permutation(3, 4, &mut rng);
    }
}
