//! # Akasha Map
//!
//! Probabilistic 3D occupancy mapping on a sparse octree.
//!
//! ## Overview
//!
//! Every voxel carries a log-odds occupancy value fused from range
//! measurements. A voxel is in one of three states:
//!
//! - **Unknown** - Never observed (no node in the tree)
//! - **Free** - Log-odds at or below 0 (probability ≤ 0.5)
//! - **Occupied** - Log-odds above 0
//!
//! ## Features
//!
//! - **Sparse Octree**: Lazily created nodes, pruning of homogeneous blocks
//! - **Ray Classification**: 3D DDA traversal into occupied/free key sets
//! - **Log-Odds Fusion**: Clamped hit/miss updates with prune-after-batch
//! - **Region Operations**: Window copy, rigid translation, ground search
//! - **Persistence**: `.ot`/`.bt` formats with crash-safe replacement
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use akasha_map::{OccupancyOctree, Point3, RayClassifier, SensorModel, update};
//!
//! let mut tree = OccupancyOctree::new(0.1, 16, SensorModel::default());
//! let classifier = RayClassifier::default();
//!
//! let origin = Point3::new(0.0, 0.0, 0.5);
//! let points = vec![Point3::new(2.0, 0.3, 0.5), Point3::new(2.0, -0.3, 0.5)];
//! let stats = update::insert_measurement(&mut tree, &classifier, origin, &points, &[], true);
//!
//! println!("Updated {} voxels", stats.cells_updated());
//! ```
//!
//! ## Coordinate System
//!
//! Right-handed map frame, meters. Z is up; ground search scans along Z.

#![warn(missing_docs)]

// Core geometric types
pub mod core;

// Key codec, nodes and the tree itself
pub mod octree;

// Ray traversal and measurement classification
pub mod raycast;

// Log-odds fusion of classified measurements
pub mod update;

// Bounding-box operations
pub mod region;

// Persistence (save/load) and export
pub mod io;

// Errors
pub mod error;

// Re-export commonly used types
pub use crate::core::{Bounds3, Point3};

pub use octree::{
    KeyBounds, KeyCodec, KeySet, Leaf, LeafIter, MAX_TREE_DEPTH, OccupancyNode, OccupancyOctree,
    SensorModel, VoxelKey, logit, probability,
};

pub use raycast::{Classification, ClassifierConfig, FreeRayPolicy, KeyRay, RayClassifier};

pub use update::UpdateStats;

pub use io::{LoadedMap, MapFormat, MapMetadata, MapSnapshot};

pub use error::{MapIoError, Result};
