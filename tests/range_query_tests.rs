//! End-to-end tests for both range indexes against a linear scan oracle.

use kdwave::{ExternalTree, InputError, RangeIndex, ZOrderTree};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Helpers
// ============================================================================

fn build_both(points: &[Vec<f64>]) -> (ZOrderTree, ExternalTree) {
    (
        ZOrderTree::new(points).expect("z-order build"),
        ExternalTree::new(points).expect("external build"),
    )
}

fn scan(points: &[Vec<f64>], min: &[f64], max: &[f64]) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.iter().zip(min.iter().zip(max)).all(|(v, (lo, hi))| v >= lo && v <= hi))
        .map(|(i, _)| i)
        .collect()
}

fn check_rect_queries(
    trees: &[&dyn RangeIndex],
    points: &[Vec<f64>],
    min: &[f64],
    max: &[f64],
    rng: &mut ChaCha8Rng,
) {
    let expected = scan(points, min, max);
    for tree in trees {
        assert_eq!(
            tree.count(min, max).unwrap(),
            expected.len(),
            "count for {:?}..{:?}",
            min,
            max
        );
        let mut reported = tree.report(min, max).unwrap();
        reported.sort_unstable();
        assert_eq!(reported, expected, "report for {:?}..{:?}", min, max);

        let sampled = tree.sample(min, max, 7, rng).unwrap();
        let mut dedup = sampled.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), sampled.len(), "sample returned duplicates");
        assert_eq!(sampled.len(), expected.len().min(7));
        for s in &sampled {
            assert!(expected.contains(s), "sampled {} outside rectangle", s);
        }
    }
}

/// The 20-point grid from the examples: x in 0..5, y in 0..4.
fn grid_5x4() -> Vec<Vec<f64>> {
    let mut points = Vec::new();
    for y in (0..4).rev() {
        for x in 0..5 {
            points.push(vec![x as f64, y as f64]);
        }
    }
    points
}

// ============================================================================
// Grid scenarios
// ============================================================================

#[test]
fn test_grid_inner_rectangle() {
    let points = grid_5x4();
    let (zt, et) = build_both(&points);
    let mut rng = ChaCha8Rng::seed_from_u64(100);

    for tree in [&zt as &dyn RangeIndex, &et] {
        assert_eq!(tree.count(&[1.0, 1.0], &[2.0, 2.0]).unwrap(), 4);
        let mut reported = tree.report(&[1.0, 1.0], &[2.0, 2.0]).unwrap();
        reported.sort_unstable();
        assert_eq!(reported, vec![6, 7, 11, 12]);

        let sampled = tree.sample(&[1.0, 1.0], &[2.0, 2.0], 3, &mut rng).unwrap();
        assert_eq!(sampled.len(), 3);
        for s in &sampled {
            assert!([6usize, 7, 11, 12].contains(s));
        }
    }
}

#[test]
fn test_grid_full_and_oversized_rectangles() {
    let points = grid_5x4();
    let (zt, et) = build_both(&points);
    for tree in [&zt as &dyn RangeIndex, &et] {
        assert_eq!(tree.count(&[0.0, 0.0], &[4.0, 4.0]).unwrap(), 20);
        assert_eq!(tree.count(&[-1.0, -1.0], &[5.0, 5.0]).unwrap(), 20);
    }
}

#[test]
fn test_grid_disjoint_rectangle() {
    let points = grid_5x4();
    let (zt, et) = build_both(&points);
    for tree in [&zt as &dyn RangeIndex, &et] {
        assert_eq!(tree.count(&[5.0, 0.0], &[6.0, 4.0]).unwrap(), 0);
        assert!(tree.report(&[5.0, 0.0], &[6.0, 4.0]).unwrap().is_empty());
    }
}

#[test]
fn test_inverted_rectangle_is_empty_not_error() {
    let points = grid_5x4();
    let (zt, et) = build_both(&points);
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for tree in [&zt as &dyn RangeIndex, &et] {
        assert_eq!(tree.count(&[3.0, 0.0], &[1.0, 4.0]).unwrap(), 0);
        assert!(tree.report(&[3.0, 0.0], &[1.0, 4.0]).unwrap().is_empty());
        assert!(tree
            .sample(&[3.0, 0.0], &[1.0, 4.0], 5, &mut rng)
            .unwrap()
            .is_empty());
    }
}

// ============================================================================
// Single point, extreme coordinates
// ============================================================================

#[test]
fn test_single_point_extremes() {
    let points = vec![vec![1.5, -2.25, 1e308]];
    let (zt, et) = build_both(&points);
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    for tree in [&zt as &dyn RangeIndex, &et] {
        assert_eq!(
            tree.count(&[1.0, -3.0, 0.0], &[2.0, 0.0, f64::MAX]).unwrap(),
            1
        );
        assert_eq!(
            tree.sample(&[1.0, -3.0, 0.0], &[2.0, 0.0, f64::MAX], 10, &mut rng)
                .unwrap(),
            vec![0]
        );
        assert_eq!(tree.count(&[1.6, -3.0, 0.0], &[2.0, 0.0, f64::MAX]).unwrap(), 0);
    }
}

// ============================================================================
// Input validation
// ============================================================================

#[test]
fn test_invalid_construction() {
    assert_eq!(
        ZOrderTree::new::<Vec<f64>>(&[]).unwrap_err(),
        InputError::EmptyPointSet
    );
    assert_eq!(
        ExternalTree::new(&[vec![1.0]]).unwrap_err(),
        InputError::BadDimension(1)
    );
    assert_eq!(
        ZOrderTree::new(&[vec![1.0, 2.0], vec![1.0, f64::INFINITY]]).unwrap_err(),
        InputError::NotFinite
    );
    assert_eq!(
        ExternalTree::new(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err(),
        InputError::RaggedPoint(1)
    );
}

#[test]
fn test_invalid_queries() {
    let (zt, et) = build_both(&grid_5x4());
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    for tree in [&zt as &dyn RangeIndex, &et] {
        assert!(matches!(
            tree.count(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]),
            Err(InputError::RectDimension { .. })
        ));
        assert_eq!(
            tree.report(&[0.0, f64::NAN], &[1.0, 1.0]),
            Err(InputError::NotFinite)
        );
        assert_eq!(
            tree.sample(&[0.0, 0.0], &[1.0, 1.0], 0, &mut rng),
            Err(InputError::ZeroSampleCount)
        );
    }
}

// ============================================================================
// Randomized agreement with the linear scan
// ============================================================================

#[test]
fn test_random_3d_agrees_with_scan() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let points: Vec<Vec<f64>> = (0..1000)
        .map(|_| (0..3).map(|_| rng.gen_range(-1e3..1e3)).collect())
        .collect();
    let (zt, et) = build_both(&points);
    let trees: [&dyn RangeIndex; 2] = [&zt, &et];

    for _ in 0..100 {
        let mut min = [0.0f64; 3];
        let mut max = [0.0f64; 3];
        for d in 0..3 {
            let a: f64 = rng.gen_range(-1.2e3..1.2e3);
            let b: f64 = rng.gen_range(-1.2e3..1.2e3);
            min[d] = a.min(b);
            max[d] = a.max(b);
        }
        check_rect_queries(&trees, &points, &min, &max, &mut rng);
    }
}

#[test]
fn test_full_double_range_coordinates() {
    let mut rng = ChaCha8Rng::seed_from_u64(43);
    let points: Vec<Vec<f64>> = (0..500)
        .map(|_| {
            (0..3)
                .map(|_| {
                    let magnitude = 10f64.powf(rng.gen_range(-300.0..300.0));
                    if rng.gen_bool(0.5) {
                        magnitude
                    } else {
                        -magnitude
                    }
                })
                .collect()
        })
        .collect();
    let (zt, et) = build_both(&points);
    let trees: [&dyn RangeIndex; 2] = [&zt, &et];

    for _ in 0..50 {
        let mut min = [0.0f64; 3];
        let mut max = [0.0f64; 3];
        for d in 0..3 {
            let a = points[rng.gen_range(0..points.len())][d];
            let b = points[rng.gen_range(0..points.len())][d];
            min[d] = a.min(b);
            max[d] = a.max(b);
        }
        check_rect_queries(&trees, &points, &min, &max, &mut rng);
    }
}

#[test]
fn test_duplicate_heavy_points() {
    // Few distinct values per dimension exercise the dense-rank sharing
    // and the median shifting of the external tree.
    let mut rng = ChaCha8Rng::seed_from_u64(44);
    let points: Vec<Vec<f64>> = (0..2000)
        .map(|_| {
            (0..2)
                .map(|_| [0.0, 0.5, 1.0, 2.0][rng.gen_range(0..4)])
                .collect()
        })
        .collect();
    let (zt, et) = build_both(&points);
    let trees: [&dyn RangeIndex; 2] = [&zt, &et];
    for lo in [0.0, 0.5, 1.0] {
        for hi in [0.5, 1.0, 2.0] {
            if lo > hi {
                continue;
            }
            check_rect_queries(&trees, &points, &[lo, lo], &[hi, hi], &mut rng);
        }
    }
}

#[test]
fn test_higher_dimensions() {
    let mut rng = ChaCha8Rng::seed_from_u64(45);
    let points: Vec<Vec<f64>> = (0..600)
        .map(|_| (0..5).map(|_| rng.gen_range(0.0f64..32.0).floor()).collect())
        .collect();
    let (zt, et) = build_both(&points);
    let trees: [&dyn RangeIndex; 2] = [&zt, &et];

    for _ in 0..40 {
        let mut min = [0.0f64; 5];
        let mut max = [0.0f64; 5];
        for d in 0..5 {
            let a = rng.gen_range(0.0f64..32.0).floor();
            let b = rng.gen_range(0.0f64..32.0).floor();
            min[d] = a.min(b);
            max[d] = a.max(b);
        }
        check_rect_queries(&trees, &points, &min, &max, &mut rng);
    }
}

// ============================================================================
// Sampling behaviour
// ============================================================================

#[test]
fn test_sample_membership_large_set() {
    let mut rng = ChaCha8Rng::seed_from_u64(46);
    let points: Vec<Vec<f64>> = (0..100_000)
        .map(|_| (0..3).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect();
    let (zt, et) = build_both(&points);

    for _ in 0..20 {
        let mut min = [0.0f64; 3];
        let mut max = [0.0f64; 3];
        for d in 0..3 {
            let a: f64 = rng.gen_range(0.0..1.0);
            let b: f64 = rng.gen_range(0.0..1.0);
            min[d] = a.min(b);
            max[d] = a.max(b);
        }
        let expected = scan(&points, &min, &max);
        for tree in [&zt as &dyn RangeIndex, &et] {
            let sampled = tree.sample(&min, &max, 1000, &mut rng).unwrap();
            assert_eq!(sampled.len(), expected.len().min(1000));
            let mut dedup = sampled.clone();
            dedup.sort_unstable();
            dedup.dedup();
            assert_eq!(dedup.len(), sampled.len());
            for s in &sampled {
                assert!(expected.binary_search(s).is_ok(), "{} not in rectangle", s);
            }
        }
    }
}

#[test]
fn test_sample_frequencies_roughly_uniform() {
    let points = grid_5x4();
    let (zt, _) = build_both(&points);
    let mut rng = ChaCha8Rng::seed_from_u64(47);

    // Rectangle holding 8 points; draw 2 per round.
    let expected = scan(&points, &[0.0, 0.0], &[3.0, 1.0]);
    assert_eq!(expected.len(), 8);
    let rounds = 6000;
    let mut hits = std::collections::HashMap::new();
    for _ in 0..rounds {
        for s in zt.sample(&[0.0, 0.0], &[3.0, 1.0], 2, &mut rng).unwrap() {
            *hits.entry(s).or_insert(0usize) += 1;
        }
    }
    let expect_per_point = rounds * 2 / 8;
    for idx in expected {
        let h = *hits.get(&idx).unwrap_or(&0);
        let deviation = (h as f64 - expect_per_point as f64).abs() / expect_per_point as f64;
        assert!(
            deviation < 0.15,
            "index {} drawn {} times, expected about {}",
            idx,
            h,
            expect_per_point
        );
    }
}

#[test]
fn test_sample_is_deterministic_per_seed() {
    let points = grid_5x4();
    let (zt, _) = build_both(&points);
    let a = zt
        .sample(&[0.0, 0.0], &[4.0, 3.0], 5, &mut ChaCha8Rng::seed_from_u64(5))
        .unwrap();
    let b = zt
        .sample(&[0.0, 0.0], &[4.0, 3.0], 5, &mut ChaCha8Rng::seed_from_u64(5))
        .unwrap();
    assert_eq!(a, b);
}

// ============================================================================
// Signed zero handling
// ============================================================================

#[test]
fn test_signed_zeros_are_distinct_ranks() {
    // The order-preserving encoding keeps -0.0 below +0.0, so the two
    // zeros are distinct dictionary entries and bounds pick sides.
    let points = vec![vec![-0.0, 1.0], vec![0.0, 1.0], vec![1.0, 1.0]];
    let (zt, et) = build_both(&points);
    for tree in [&zt as &dyn RangeIndex, &et] {
        // A +0.0 lower bound excludes the -0.0 point.
        assert_eq!(tree.count(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 2);
        // A -0.0 lower bound includes both zeros.
        assert_eq!(tree.count(&[-0.0, 0.0], &[0.0, 2.0]).unwrap(), 2);
        // A -0.0 upper bound keeps only the -0.0 point.
        assert_eq!(tree.count(&[-1.0, 0.0], &[-0.0, 2.0]).unwrap(), 1);
    }
}
