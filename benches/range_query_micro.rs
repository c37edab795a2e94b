//! Micro-benchmarks for range counting, reporting and sampling.
//!
//! Compares the Z-order and externalized orderings against a naive
//! linear scan across selectivities.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kdwave::{ExternalTree, RangeIndex, ZOrderTree};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn generate_points(n: usize, k: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..k).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect()
}

/// Cube rectangles centred in the unit cube with the given edge length.
fn generate_rects(count: usize, k: usize, edge: f64, seed: u64) -> Vec<(Vec<f64>, Vec<f64>)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let mut min = Vec::with_capacity(k);
            let mut max = Vec::with_capacity(k);
            for _ in 0..k {
                let lo: f64 = rng.gen_range(0.0..1.0 - edge);
                min.push(lo);
                max.push(lo + edge);
            }
            (min, max)
        })
        .collect()
}

fn bench_count(c: &mut Criterion) {
    let points = generate_points(100_000, 3, 42);
    let zt = ZOrderTree::new(&points).unwrap();
    let et = ExternalTree::new(&points).unwrap();

    let mut group = c.benchmark_group("count");
    for edge in [0.05, 0.2, 0.5] {
        let rects = generate_rects(100, 3, edge, 7);
        group.bench_with_input(BenchmarkId::new("zorder", edge), &rects, |b, rects| {
            b.iter(|| {
                let mut sum = 0usize;
                for (min, max) in rects {
                    sum += zt.count(black_box(min), black_box(max)).unwrap();
                }
                sum
            })
        });
        group.bench_with_input(BenchmarkId::new("external", edge), &rects, |b, rects| {
            b.iter(|| {
                let mut sum = 0usize;
                for (min, max) in rects {
                    sum += et.count(black_box(min), black_box(max)).unwrap();
                }
                sum
            })
        });
        group.bench_with_input(BenchmarkId::new("scan", edge), &rects, |b, rects| {
            b.iter(|| {
                let mut sum = 0usize;
                for (min, max) in rects {
                    sum += points
                        .iter()
                        .filter(|p| {
                            p.iter()
                                .zip(min.iter().zip(max.iter()))
                                .all(|(v, (lo, hi))| v >= lo && v <= hi)
                        })
                        .count();
                }
                sum
            })
        });
    }
    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let points = generate_points(100_000, 3, 43);
    let zt = ZOrderTree::new(&points).unwrap();
    let et = ExternalTree::new(&points).unwrap();
    let rects = generate_rects(20, 3, 0.2, 11);

    let mut group = c.benchmark_group("report");
    group.bench_function("zorder", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for (min, max) in &rects {
                total += zt.report(black_box(min), black_box(max)).unwrap().len();
            }
            total
        })
    });
    group.bench_function("external", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for (min, max) in &rects {
                total += et.report(black_box(min), black_box(max)).unwrap().len();
            }
            total
        })
    });
    group.finish();
}

fn bench_sample(c: &mut Criterion) {
    let points = generate_points(100_000, 3, 44);
    let zt = ZOrderTree::new(&points).unwrap();
    let rects = generate_rects(20, 3, 0.5, 13);

    c.bench_function("sample_100_of_large", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        b.iter(|| {
            let mut total = 0usize;
            for (min, max) in &rects {
                total += zt
                    .sample(black_box(min), black_box(max), 100, &mut rng)
                    .unwrap()
                    .len();
            }
            total
        })
    });
}

criterion_group!(benches, bench_count, bench_report, bench_sample);
criterion_main!(benches);
