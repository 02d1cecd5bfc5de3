//! Lazy leaf traversal.
//!
//! Leaves are visited depth-first with an explicit stack. Each stack entry
//! carries the lower-corner key of its node, so the reported key and center
//! are derived without walking back up the tree.
//!
//! ```text
//!   stack: [(root, base=0, d=0)]
//!   pop root  -> push children 7..0 with their bases
//!   pop child -> leaf? yield (key_at_depth(base, d), d, value)
//! ```

use super::key::{KeyBounds, KeyCodec, VoxelKey};
use super::node::OccupancyNode;
use crate::core::Point3;

/// One leaf as seen by a traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Leaf {
    /// Key of the leaf at its own depth (center key for coarse leaves)
    pub key: VoxelKey,
    /// Depth of the leaf (max depth for finest voxels)
    pub depth: u8,
    /// Stored log-odds value
    pub log_odds: f64,
    /// Center of the leaf in map coordinates
    pub center: Point3,
    /// Edge length in meters
    pub size: f64,
}

impl Leaf {
    /// Occupancy probability above 0.5.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.log_odds > 0.0
    }
}

/// Depth-first iterator over leaves, optionally restricted to a key box.
///
/// Only subtrees whose key span intersects the box are descended; a coarse
/// leaf that straddles the box boundary is reported as a whole.
#[derive(Clone)]
pub struct LeafIter<'a> {
    codec: KeyCodec,
    stack: Vec<(&'a OccupancyNode, VoxelKey, u8)>,
    bbx: Option<KeyBounds>,
}

impl<'a> LeafIter<'a> {
    pub(crate) fn new(codec: KeyCodec, root: Option<&'a OccupancyNode>, bbx: Option<KeyBounds>) -> Self {
        let mut stack = Vec::with_capacity(codec.max_depth() as usize * 8);
        if let Some(root) = root {
            stack.push((root, VoxelKey::default(), 0));
        }
        Self { codec, stack, bbx }
    }

    fn intersects(&self, base: VoxelKey, depth: u8) -> bool {
        self.bbx
            .as_ref()
            .is_none_or(|bbx| self.codec.node_intersects(base, depth, bbx))
    }
}

impl Iterator for LeafIter<'_> {
    type Item = Leaf;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, base, depth)) = self.stack.pop() {
            if !self.intersects(base, depth) {
                continue;
            }
            if node.has_children() {
                for pos in (0..8).rev() {
                    if let Some(child) = node.child(pos) {
                        let child_base = self.codec.child_base(base, depth, pos);
                        self.stack.push((child, child_base, depth + 1));
                    }
                }
                continue;
            }
            let key = self.codec.key_at_depth(base, depth);
            return Some(Leaf {
                key,
                depth,
                log_odds: node.log_odds(),
                center: self.codec.key_to_coord(key, depth),
                size: self.codec.node_size(depth),
            });
        }
        None
    }
}
