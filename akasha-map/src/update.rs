//! Log-odds fusion of classified key sets into a tree.
//!
//! Application order is fixed:
//! 1. every free key receives a miss (keys also in the occupied set are skipped)
//! 2. every occupied key receives a hit
//! 3. the tree is pruned once, if compression is enabled
//!
//! Pruning per batch rather than per voxel keeps a batch from repeatedly
//! collapsing and re-expanding the same blocks.

use log::debug;

use crate::core::Point3;
use crate::octree::{KeyBounds, KeySet, OccupancyOctree};
use crate::raycast::{Classification, RayClassifier};

/// Statistics from integrating one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateStats {
    /// Voxels that received a miss
    pub cells_free: usize,
    /// Voxels that received a hit
    pub cells_occupied: usize,
    /// Nodes removed by the trailing prune
    pub nodes_pruned: usize,
    /// Input points rejected during classification
    pub rejected: usize,
    /// Key extent touched by the batch
    pub update_bounds: Option<KeyBounds>,
}

impl UpdateStats {
    /// Total voxels updated.
    pub fn cells_updated(&self) -> usize {
        self.cells_free + self.cells_occupied
    }

    /// Merge another result into this one
    pub fn merge(&mut self, other: &UpdateStats) {
        self.cells_free += other.cells_free;
        self.cells_occupied += other.cells_occupied;
        self.nodes_pruned += other.nodes_pruned;
        self.rejected += other.rejected;
        self.update_bounds = match (self.update_bounds, other.update_bounds) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
    }
}

/// Apply free then occupied keys, then prune when `compress` is set.
pub fn apply(
    tree: &mut OccupancyOctree,
    occupied: &KeySet,
    free: &KeySet,
    compress: bool,
) -> UpdateStats {
    let mut stats = UpdateStats::default();

    for key in free.iter().filter(|k| !occupied.contains(k)) {
        tree.update(*key, false);
        stats.cells_free += 1;
    }

    for key in occupied {
        tree.update(*key, true);
        stats.cells_occupied += 1;
    }

    if compress {
        stats.nodes_pruned = tree.prune();
    }
    stats
}

/// Apply a [`Classification`].
pub fn apply_classification(
    tree: &mut OccupancyOctree,
    classification: &Classification,
    compress: bool,
) -> UpdateStats {
    let mut stats = apply(tree, &classification.occupied, &classification.free, compress);
    stats.rejected = classification.rejected;
    stats.update_bounds = classification.update_bounds;
    stats
}

/// Classify one measurement against `tree` and fuse it.
pub fn insert_measurement(
    tree: &mut OccupancyOctree,
    classifier: &RayClassifier,
    origin: Point3,
    points: &[Point3],
    probes: &[Point3],
    compress: bool,
) -> UpdateStats {
    let classification = classifier.classify(tree, origin, points, probes);
    let stats = apply_classification(tree, &classification, compress);
    debug!(
        "Inserted {} points: {} free, {} occupied, {} pruned",
        points.len(),
        stats.cells_free,
        stats.cells_occupied,
        stats.nodes_pruned
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::SensorModel;
    use crate::raycast::ClassifierConfig;
    use approx::assert_relative_eq;

    #[test]
    fn test_occupied_wins_on_conflict() {
        let mut tree = OccupancyOctree::new(0.1, 16, SensorModel::default());
        let key = tree.key(Point3::ZERO).unwrap();
        let set: KeySet = [key].into_iter().collect();
        let stats = apply(&mut tree, &set, &set, false);
        assert_eq!(stats.cells_free, 0);
        assert_eq!(stats.cells_occupied, 1);
        let node = tree.search_key(key, 16).unwrap();
        assert!(node.is_occupied());
        assert_relative_eq!(node.log_odds(), tree.sensor_model().hit_log_odds());
    }

    #[test]
    fn test_free_applied_before_occupied() {
        let mut tree = OccupancyOctree::new(0.1, 16, SensorModel::default());
        let a = tree.key(Point3::ZERO).unwrap();
        let b = tree.key(Point3::new(0.5, 0.0, 0.0)).unwrap();
        let occupied: KeySet = [b].into_iter().collect();
        let free: KeySet = [a].into_iter().collect();
        let stats = apply(&mut tree, &occupied, &free, false);
        assert_eq!(stats.cells_updated(), 2);
        assert!(!tree.search_key(a, 16).unwrap().is_occupied());
        assert!(tree.search_key(b, 16).unwrap().is_occupied());
    }

    #[test]
    fn test_compress_prunes_batch() {
        let mut tree = OccupancyOctree::new(0.1, 16, SensorModel::default());
        let base = tree.key(Point3::ZERO).unwrap();
        let mut free = KeySet::new();
        for i in 0..8u16 {
            free.insert(crate::octree::VoxelKey::new(
                base.x + (i & 1),
                base.y + ((i >> 1) & 1),
                base.z + ((i >> 2) & 1),
            ));
        }
        let stats = apply(&mut tree, &KeySet::new(), &free, true);
        assert_eq!(stats.nodes_pruned, 8);
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_insert_measurement() {
        let mut tree = OccupancyOctree::new(0.1, 16, SensorModel::default());
        let classifier = RayClassifier::new(ClassifierConfig::default());
        let stats = insert_measurement(
            &mut tree,
            &classifier,
            Point3::ZERO,
            &[Point3::new(1.0, 0.0, 0.0), Point3::new(f64::NAN, 0.0, 0.0)],
            &[],
            true,
        );
        assert_eq!(stats.cells_occupied, 1);
        assert_eq!(stats.cells_free, 10);
        assert_eq!(stats.rejected, 1);
        assert!(stats.update_bounds.is_some());
        assert!(tree.search(Point3::new(1.0, 0.0, 0.0)).unwrap().is_occupied());
    }

    #[test]
    fn test_merge_stats() {
        let mut a = UpdateStats {
            cells_free: 2,
            ..UpdateStats::default()
        };
        let b = UpdateStats {
            cells_occupied: 3,
            update_bounds: Some(KeyBounds::from_key(Default::default())),
            ..UpdateStats::default()
        };
        a.merge(&b);
        assert_eq!(a.cells_updated(), 5);
        assert!(a.update_bounds.is_some());
    }
}
