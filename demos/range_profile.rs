//! Quick wall-clock profile of the two indexes against a linear scan.
//!
//! Run with: cargo run --release --example range_profile

use std::time::Instant;

use kdwave::{ExternalTree, RangeIndex, ZOrderTree};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn main() {
    let n = 1_000_000;
    let k = 3;
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let points: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..k).map(|_| rng.gen_range(0.0..1.0)).collect())
        .collect();

    let start = Instant::now();
    let zt = ZOrderTree::new(&points).unwrap();
    println!(
        "z-order build: {:.2?} ({} MiB succinct)",
        start.elapsed(),
        zt.heap_bits() / 8 / 1024 / 1024
    );

    let start = Instant::now();
    let et = ExternalTree::new(&points).unwrap();
    println!(
        "external build: {:.2?} ({} MiB succinct)",
        start.elapsed(),
        et.heap_bits() / 8 / 1024 / 1024
    );

    // Rectangles at three selectivities.
    for edge in [0.05f64, 0.2, 0.5] {
        let rects: Vec<(Vec<f64>, Vec<f64>)> = (0..100)
            .map(|_| {
                let mut min = Vec::new();
                let mut max = Vec::new();
                for _ in 0..k {
                    let lo: f64 = rng.gen_range(0.0..1.0 - edge);
                    min.push(lo);
                    max.push(lo + edge);
                }
                (min, max)
            })
            .collect();

        let start = Instant::now();
        let mut total = 0usize;
        for (min, max) in &rects {
            total += zt.count(min, max).unwrap();
        }
        let z_time = start.elapsed();

        let start = Instant::now();
        let mut total_e = 0usize;
        for (min, max) in &rects {
            total_e += et.count(min, max).unwrap();
        }
        let e_time = start.elapsed();

        let start = Instant::now();
        let mut total_s = 0usize;
        for (min, max) in &rects {
            total_s += points
                .iter()
                .filter(|p| {
                    p.iter()
                        .zip(min.iter().zip(max.iter()))
                        .all(|(v, (lo, hi))| v >= lo && v <= hi)
                })
                .count();
        }
        let s_time = start.elapsed();

        assert_eq!(total, total_s);
        assert_eq!(total_e, total_s);
        println!(
            "edge {:.2}: {:>9} hits | zorder {:.2?} | external {:.2?} | scan {:.2?}",
            edge,
            total / rects.len(),
            z_time,
            e_time,
            s_time
        );
    }

    // Sampling out of a large result.
    let start = Instant::now();
    let sampled = zt
        .sample(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0], 1000, &mut rng)
        .unwrap();
    println!("sample 1000 of {}: {:.2?}", n, start.elapsed());
    assert_eq!(sampled.len(), 1000);
}
