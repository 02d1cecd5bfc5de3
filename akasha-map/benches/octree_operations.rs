//! Benchmark octree classification, update and region operations.

use akasha_map::region::{copy_into, ground_z};
use akasha_map::{Bounds3, OccupancyOctree, Point3, RayClassifier, SensorModel, update};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::f64::consts::PI;

/// Ring scan of a cylindrical room around `origin`.
fn ring_scan(origin: Point3, radius: f64, rings: usize, points_per_ring: usize) -> Vec<Point3> {
    let mut points = Vec::with_capacity(rings * points_per_ring);
    for r in 0..rings {
        let z = origin.z - 0.5 + r as f64 / rings.max(1) as f64;
        for i in 0..points_per_ring {
            let angle = 2.0 * PI * i as f64 / points_per_ring as f64;
            points.push(Point3::new(
                origin.x + radius * angle.cos(),
                origin.y + radius * angle.sin(),
                z,
            ));
        }
    }
    points
}

fn mapped_tree() -> OccupancyOctree {
    let mut tree = OccupancyOctree::new(0.05, 16, SensorModel::default());
    let classifier = RayClassifier::default();
    for i in 0..10 {
        let origin = Point3::new(i as f64 * 0.2, 0.0, 0.5);
        let scan = ring_scan(origin, 4.0, 16, 360);
        update::insert_measurement(&mut tree, &classifier, origin, &scan, &[], true);
    }
    tree
}

fn bench_classify(c: &mut Criterion) {
    let tree = OccupancyOctree::new(0.05, 16, SensorModel::default());
    let classifier = RayClassifier::default();
    let origin = Point3::new(0.0, 0.0, 0.5);
    let scan = ring_scan(origin, 4.0, 16, 360);

    c.bench_function("classify_5760pts", |b| {
        b.iter(|| {
            let result = classifier.classify(&tree, black_box(origin), black_box(&scan), &[]);
            black_box(result)
        })
    });
}

fn bench_insert_resolutions(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_resolution");
    let classifier = RayClassifier::default();
    let origin = Point3::new(0.0, 0.0, 0.5);
    let scan = ring_scan(origin, 4.0, 8, 360);

    for resolution in [0.2, 0.1, 0.05].iter() {
        let mut tree = OccupancyOctree::new(*resolution, 16, SensorModel::default());

        // Warm up
        for _ in 0..3 {
            update::insert_measurement(&mut tree, &classifier, origin, &scan, &[], true);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(resolution),
            resolution,
            |b, _| {
                b.iter(|| {
                    let stats = update::insert_measurement(
                        &mut tree,
                        &classifier,
                        black_box(origin),
                        black_box(&scan),
                        &[],
                        true,
                    );
                    black_box(stats)
                })
            },
        );
    }

    group.finish();
}

fn bench_local_window(c: &mut Criterion) {
    let mut global = mapped_tree();
    let window = Bounds3::around(Point3::new(1.0, 0.0, 0.5), 2.0, 1.0);

    c.bench_function("copy_local_window", |b| {
        b.iter(|| {
            let mut local = global.empty_like();
            let copied = copy_into(&mut global, &mut local, black_box(&window));
            black_box(copied)
        })
    });
}

fn bench_queries(c: &mut Criterion) {
    let mut tree = mapped_tree();

    c.bench_function("leaf_iteration", |b| {
        b.iter(|| black_box(tree.leaves().filter(|l| l.is_occupied()).count()))
    });

    c.bench_function("ground_z", |b| {
        b.iter(|| black_box(ground_z(&mut tree, black_box(4.0), 0.0, 0.3)))
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_insert_resolutions,
    bench_local_window,
    bench_queries
);
criterion_main!(benches);
