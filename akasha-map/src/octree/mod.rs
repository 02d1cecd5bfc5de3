//! Sparse probabilistic occupancy octree.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   OccupancyOctree                   │
//! │  ┌─────────────┐  ┌────────────────┐  ┌──────────┐  │
//! │  │  KeyCodec   │  │  SensorModel   │  │   root   │  │
//! │  │ coord<->key │  │ hit/miss/clamp │  │  (lazy)  │  │
//! │  └─────────────┘  └────────────────┘  └────┬─────┘  │
//! │                                 8 slots    │        │
//! │                         ┌──────┬──────┬────┴──┐     │
//! │                         ▼      ▼      ▼       ▼     │
//! │                        node   node   None    ...    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Log-Odds Representation
//!
//! Each node stores `L = ln(p / (1 - p))`:
//!
//! | Probability | Log-odds | Meaning        |
//! |-------------|----------|----------------|
//! | 0.12        | -1.99    | clamp (free)   |
//! | 0.5         | 0.0      | unknown        |
//! | 0.97        | +3.48    | clamp (occupied) |
//!
//! A node is occupied when `L > 0`, regardless of the clamps.

mod config;
mod iter;
mod key;
mod node;
mod tree;

pub use config::{SensorModel, logit, probability};
pub use iter::{Leaf, LeafIter};
pub use key::{KeyBounds, KeyCodec, KeySet, MAX_TREE_DEPTH, VoxelKey};
pub use node::{OccupancyNode, PRUNE_EPSILON};
pub use tree::OccupancyOctree;
