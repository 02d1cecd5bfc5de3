//! Map export for publication.
//!
//! A [`MapSnapshot`] is the compact form: every leaf with its depth and
//! value. It rebuilds an equivalent tree through
//! [`OccupancyOctree::from_snapshot`]. The full and binary byte forms reuse
//! the file codecs.

use std::io::Cursor;

use serde::{Deserialize, Serialize};

use super::binary_format::{read_binary, write_binary};
use super::full_format::{read_full, write_full};
use crate::error::Result;
use crate::octree::{OccupancyOctree, SensorModel, VoxelKey};

/// One exported leaf.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord {
    /// Key of the leaf at its depth
    pub key: VoxelKey,
    /// Leaf depth
    pub depth: u8,
    /// Log-odds value
    pub log_odds: f64,
}

/// Leaf-sequence export of a tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    /// Finest voxel size in meters
    pub resolution: f64,
    /// Tree depth
    pub max_depth: u8,
    /// Sensor model of the exported tree
    pub sensor_model: SensorModel,
    /// Leaves in traversal order
    pub leaves: Vec<LeafRecord>,
}

impl MapSnapshot {
    /// Export every leaf of `tree`.
    pub fn from_tree(tree: &OccupancyOctree) -> Self {
        let leaves = tree
            .leaves()
            .map(|leaf| LeafRecord {
                key: leaf.key,
                depth: leaf.depth,
                log_odds: leaf.log_odds,
            })
            .collect();
        Self {
            resolution: tree.resolution(),
            max_depth: tree.max_depth(),
            sensor_model: *tree.sensor_model(),
            leaves,
        }
    }

    /// Number of exported leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True if the snapshot has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Number of occupied leaves.
    pub fn occupied_count(&self) -> usize {
        self.leaves.iter().filter(|l| l.log_odds > 0.0).count()
    }
}

impl OccupancyOctree {
    /// Rebuild a tree from a leaf sequence.
    ///
    /// Inner values are recomputed from the leaves; homogeneous octets are
    /// left unpruned.
    pub fn from_snapshot(snapshot: &MapSnapshot) -> Self {
        let mut tree = OccupancyOctree::new(
            snapshot.resolution,
            snapshot.max_depth,
            snapshot.sensor_model,
        );
        for record in &snapshot.leaves {
            tree.set_node_value(record.key, record.log_odds, record.depth);
        }
        tree.update_inner_occupancy();
        tree
    }
}

/// Serialize `tree` in the full (structure) form.
pub fn to_full_bytes(tree: &OccupancyOctree) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_full(tree, &mut buffer)?;
    Ok(buffer)
}

/// Serialize `tree` in the binary (occupancy only) form.
pub fn to_binary_bytes(tree: &OccupancyOctree) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_binary(tree, &mut buffer)?;
    Ok(buffer)
}

/// Parse the full form.
pub fn from_full_bytes(bytes: &[u8]) -> Result<OccupancyOctree> {
    read_full(&mut Cursor::new(bytes))
}

/// Parse the binary form.
pub fn from_binary_bytes(bytes: &[u8]) -> Result<OccupancyOctree> {
    read_binary(&mut Cursor::new(bytes))
}
