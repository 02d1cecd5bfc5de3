//! Test utilities for Akasha map integration tests.
//!
//! Helpers for building synthetic scenes and randomly populated trees.

#![allow(dead_code)]

use akasha_map::{OccupancyOctree, Point3, RayClassifier, SensorModel, update};
use rand::prelude::*;

/// Tree with 0.1 m voxels and the default sensor model.
pub fn test_tree() -> OccupancyOctree {
    OccupancyOctree::new(0.1, 16, SensorModel::default())
}

/// Random point uniformly inside the cube of half extent `half`.
pub fn random_point(rng: &mut StdRng, half: f64) -> Point3 {
    Point3::new(
        rng.random_range(-half..half),
        rng.random_range(-half..half),
        rng.random_range(-half..half),
    )
}

/// Points on the walls of an axis-aligned room, sampled on a regular grid.
pub fn room_points(width: f64, depth: f64, height: f64, spacing: f64) -> Vec<Point3> {
    let mut points = Vec::new();
    let nx = (width / spacing) as usize;
    let ny = (depth / spacing) as usize;
    let nz = (height / spacing) as usize;
    let (hx, hy) = (width * 0.5, depth * 0.5);

    for k in 0..=nz {
        let z = k as f64 * spacing;
        for i in 0..=nx {
            let x = -hx + i as f64 * spacing;
            points.push(Point3::new(x, -hy, z));
            points.push(Point3::new(x, hy, z));
        }
        for j in 0..=ny {
            let y = -hy + j as f64 * spacing;
            points.push(Point3::new(-hx, y, z));
            points.push(Point3::new(hx, y, z));
        }
    }
    points
}

/// Flat floor patch of occupied points at height `z`.
pub fn floor_points(center: Point3, half: f64, z: f64, spacing: f64) -> Vec<Point3> {
    let n = (2.0 * half / spacing) as usize;
    let mut points = Vec::with_capacity((n + 1) * (n + 1));
    for i in 0..=n {
        for j in 0..=n {
            points.push(Point3::new(
                center.x - half + i as f64 * spacing,
                center.y - half + j as f64 * spacing,
                z,
            ));
        }
    }
    points
}

/// Tree filled with `scans` random measurements from random origins.
pub fn random_tree(seed: u64, scans: usize, compress: bool) -> OccupancyOctree {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tree = test_tree();
    let classifier = RayClassifier::default();
    for _ in 0..scans {
        let origin = random_point(&mut rng, 0.5);
        let points: Vec<Point3> = (0..20).map(|_| random_point(&mut rng, 2.0)).collect();
        update::insert_measurement(&mut tree, &classifier, origin, &points, &[], compress);
    }
    tree
}
