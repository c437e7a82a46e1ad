//! Benchmarks pour la jointure de contenance

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{LineString, Point};
use geonorm::{
    containment_join, Attributes, Crs, FeatureRecord, Geometry, JoinMode, JoinOptions, Rings,
    Shape,
};

fn feature(id: String, shape: Shape) -> FeatureRecord {
    FeatureRecord {
        id,
        geometry: Geometry::new(shape, Crs::WGS84),
        attributes: Attributes::new(),
        updated_at: Utc::now(),
        is_valid_geometry: true,
        defect: None,
    }
}

/// Grille de `n × n` cellules couvrant le sud du Québec
fn regions(n: usize) -> Vec<FeatureRecord> {
    let (x0, y0, size) = (-80.0, 45.0, 20.0 / n as f64);
    let mut out = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let (x, y) = (x0 + i as f64 * size, y0 + j as f64 * size);
            let ring = LineString::from(vec![
                (x, y),
                (x + size, y),
                (x + size, y + size),
                (x, y + size),
                (x, y),
            ]);
            out.push(feature(format!("r{}_{}", i, j), Shape::Polygon(Rings::new(ring, vec![]))));
        }
    }
    out
}

/// Points pseudo-aléatoires déterministes
fn stations(count: usize) -> Vec<FeatureRecord> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..count)
        .map(|i| {
            let p = Point::new(-81.0 + next() * 22.0, 44.0 + next() * 22.0);
            feature(format!("p{}", i), Shape::Point(p))
        })
        .collect()
}

fn bench_join(c: &mut Criterion) {
    let polygons = regions(17);
    let mut group = c.benchmark_group("containment_join");

    for count in [1_000usize, 10_000, 100_000] {
        let points = stations(count);
        group.throughput(Throughput::Elements(count as u64));

        for jobs in [1usize, 4] {
            group.bench_with_input(
                BenchmarkId::new(format!("left_jobs{}", jobs), count),
                &points,
                |b, points| {
                    let options = JoinOptions::new(JoinMode::Left).with_jobs(jobs);
                    b.iter(|| {
                        let result = containment_join(black_box(points), &polygons, options).unwrap();
                        black_box(result)
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_join);
criterion_main!(benches);
