//! Bounding-box operations between and on trees.
//!
//! - [`copy_into`]: extract a window of one tree into another (local map)
//! - [`translate`]: rigidly shift a whole tree (ground alignment)
//! - [`ground_z`]: estimate the ground height under a point
//! - [`clear_bbx`], [`clear_outside_bbx`], [`clear_inside_bbx`]: in-place
//!   clearing used by control requests and insert post-processing
//!
//! ## Window extraction
//!
//! ```text
//!   source (pruned)           source (expanded in box)     dest
//!   ┌───────┬───┬───┐         ┌───────┬─┬─┬───┐           ┌─┬─┐
//!   │       │   │   │         │       ├─┼─┤   │           ├─┼─┤
//!   │       ├───┼───┤   ==>   │    ┌──┼─┼─┼┐  │   ==>     └─┴─┘
//!   │       │   │   │         │    │  │ │ ││  │         (pruned again)
//!   └───────┴───┴───┘         └────┴──┴─┴─┴┘──┘
//! ```
//!
//! Leaves straddling the box edge are expanded to the finest depth first, so
//! exactly the voxels inside the box are copied.

use log::{debug, info};

use crate::core::{Bounds3, Point3};
use crate::octree::OccupancyOctree;

/// Log-odds written by [`clear_inside_bbx`].
pub const NEARBY_CLEAR_LOG_ODDS: f64 = -1.0;

/// Minimum number of occupied samples for a ground estimate.
pub const MIN_GROUND_SAMPLES: usize = 3;

/// Copy every voxel of `source` inside `bounds` into `dest`.
///
/// Source leaves overlapping the box are expanded to the finest depth; each
/// finest leaf inside the box is touched in `dest` and its value copied.
/// `dest` is pruned afterwards, and the part of `source` expanded for the
/// copy is collapsed again. Trees with different codecs are matched through
/// voxel centers. Returns the number of voxels copied.
pub fn copy_into(source: &mut OccupancyOctree, dest: &mut OccupancyOctree, bounds: &Bounds3) -> usize {
    let Some(kb) = source.codec().bounds_to_keys(bounds) else {
        return 0;
    };
    source.expand_bbx(&kb);

    let same_codec = source.codec() == dest.codec();
    let dest_depth = dest.max_depth();
    let mut copied = 0;
    for leaf in source.leaves_in_bbx(kb.min, kb.max) {
        let key = if same_codec {
            Some(leaf.key)
        } else {
            dest.key(leaf.center)
        };
        if let Some(key) = key {
            dest.touch(key, if same_codec { leaf.depth } else { dest_depth })
                .set_log_odds(leaf.log_odds);
            copied += 1;
        }
    }
    dest.prune();
    source.prune_bbx(&kb);
    debug!("Copied {} voxels into window {:?}", copied, bounds);
    copied
}

/// Shift every voxel of `tree` by `offset` into a new tree.
///
/// The source is fully expanded first (it is meant to be replaced by the
/// result). Voxels shifted out of the key range are dropped. The result has
/// the same resolution, depth and sensor model, and is pruned.
pub fn translate(tree: &mut OccupancyOctree, offset: Point3) -> OccupancyOctree {
    tree.expand();
    let mut out = tree.empty_like();
    let depth = out.max_depth();
    let mut dropped = 0usize;
    for leaf in tree.leaves() {
        match out.key(leaf.center + offset) {
            Some(key) => out.set_node_value(key, leaf.log_odds, depth),
            None => dropped += 1,
        }
    }
    out.prune();
    if dropped > 0 {
        info!("Translation dropped {} voxels outside the map range", dropped);
    }
    out
}

/// Ground height under `(x, y)`.
///
/// Expands the vertical column of half-width `search_radius` over the full
/// height of the map to the finest depth, then takes the highest occupied
/// voxel center inside the column, minus half a voxel. `None` with fewer
/// than [`MIN_GROUND_SAMPLES`] occupied voxels. The column is left expanded.
pub fn ground_z(tree: &mut OccupancyOctree, x: f64, y: f64, search_radius: f64) -> Option<f64> {
    let column = Bounds3::new(
        Point3::new(x - search_radius, y - search_radius, f64::NEG_INFINITY),
        Point3::new(x + search_radius, y + search_radius, f64::INFINITY),
    );
    let kb = tree.codec().bounds_to_keys(&column)?;
    tree.expand_bbx(&kb);

    let depth = tree.max_depth();
    let mut samples = 0usize;
    let mut max_z = f64::NEG_INFINITY;
    for leaf in tree
        .leaves_in_bbx(kb.min, kb.max)
        .filter(|l| l.depth == depth && kb.contains(&l.key) && l.is_occupied())
    {
        samples += 1;
        max_z = max_z.max(leaf.center.z);
    }
    if samples < MIN_GROUND_SAMPLES {
        debug!("Ground search at ({:.2}, {:.2}) found {} samples", x, y, samples);
        return None;
    }
    Some(max_z - tree.resolution() * 0.5)
}

/// Mark every leaf overlapping `bounds` as free (clamp-min log-odds).
pub fn clear_bbx(tree: &mut OccupancyOctree, bounds: &Bounds3) -> usize {
    let value = tree.sensor_model().clamp_min_log_odds();
    let leaves: Vec<_> = tree.leaves_in_bounds(bounds).map(|l| (l.key, l.depth)).collect();
    for &(key, depth) in &leaves {
        tree.set_node_value(key, value, depth);
    }
    tree.update_inner_occupancy();
    leaves.len()
}

/// Delete every leaf whose key lies outside `bounds`.
pub fn clear_outside_bbx(tree: &mut OccupancyOctree, bounds: &Bounds3) -> usize {
    let Some(kb) = tree.codec().bounds_to_keys(bounds) else {
        return 0;
    };
    let outside: Vec<_> = tree
        .leaves()
        .filter(|l| !kb.contains(&l.key))
        .map(|l| (l.key, l.depth))
        .collect();
    for &(key, depth) in &outside {
        tree.delete_node(key, depth);
    }
    if !outside.is_empty() {
        debug!("Removed {} leaves outside {:?}", outside.len(), bounds);
    }
    outside.len()
}

/// Force every leaf whose key lies inside `bounds` to free.
pub fn clear_inside_bbx(tree: &mut OccupancyOctree, bounds: &Bounds3) -> usize {
    let Some(kb) = tree.codec().bounds_to_keys(bounds) else {
        return 0;
    };
    let inside: Vec<_> = tree
        .leaves_in_bbx(kb.min, kb.max)
        .filter(|l| kb.contains(&l.key))
        .map(|l| (l.key, l.depth))
        .collect();
    for &(key, depth) in &inside {
        tree.set_node_value(key, NEARBY_CLEAR_LOG_ODDS, depth);
    }
    inside.len()
}
