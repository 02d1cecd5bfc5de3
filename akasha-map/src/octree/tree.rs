//! The occupancy octree.
//!
//! ## Update rule
//!
//! Each observation adds a fixed log-odds increment to the voxel and
//! saturates the result:
//!
//! ```text
//! L(n) = clamp(L(n) + logit(p_hit | p_miss), logit(clamp_min), logit(clamp_max))
//! ```
//!
//! Saturation keeps the map responsive to change: a voxel that has been
//! observed free a thousand times still flips after a handful of hits.
//!
//! ## Structure maintenance
//!
//! Writes descend from the root, creating the path on demand. A leaf found
//! above the target depth stands for a pruned uniform block and is expanded
//! before descent so the rest of the block keeps its value. Inner values are
//! refreshed (max of children) on the way back up. Uniform octets are only
//! collapsed by an explicit [`OccupancyOctree::prune`].

use log::debug;

use super::config::SensorModel;
use super::iter::{Leaf, LeafIter};
use super::key::{KeyBounds, KeyCodec, MAX_TREE_DEPTH, VoxelKey};
use super::node::OccupancyNode;
use crate::core::{Bounds3, Point3};

/// Sparse probabilistic occupancy map.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyOctree {
    root: Option<Box<OccupancyNode>>,
    codec: KeyCodec,
    model: SensorModel,
}

impl OccupancyOctree {
    /// Create an empty tree.
    pub fn new(resolution: f64, max_depth: u8, model: SensorModel) -> Self {
        Self::with_codec(KeyCodec::new(resolution, max_depth), model)
    }

    /// Create an empty tree with the default depth (16) and sensor model.
    pub fn with_resolution(resolution: f64) -> Self {
        Self::new(resolution, MAX_TREE_DEPTH, SensorModel::default())
    }

    /// Create an empty tree just deep enough to cover `[-extent, extent)`.
    pub fn for_extent(resolution: f64, extent: f64, model: SensorModel) -> Self {
        Self::with_codec(KeyCodec::for_extent(resolution, extent), model)
    }

    /// Create an empty tree from an existing codec.
    pub fn with_codec(codec: KeyCodec, model: SensorModel) -> Self {
        Self {
            root: None,
            codec,
            model,
        }
    }

    /// Empty tree sharing this tree's resolution, depth and sensor model.
    pub fn empty_like(&self) -> Self {
        Self::with_codec(self.codec, self.model)
    }

    /// Finest voxel size in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.codec.resolution()
    }

    /// Tree depth.
    #[inline]
    pub fn max_depth(&self) -> u8 {
        self.codec.max_depth()
    }

    /// Coordinate codec of this tree.
    #[inline]
    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Sensor model used by [`update`](Self::update).
    #[inline]
    pub fn sensor_model(&self) -> &SensorModel {
        &self.model
    }

    /// Replace the sensor model. Stored values are left untouched.
    pub fn set_sensor_model(&mut self, model: SensorModel) {
        self.model = model;
    }

    /// True if the tree holds no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Root node, if any.
    #[inline]
    pub fn root(&self) -> Option<&OccupancyNode> {
        self.root.as_deref()
    }

    pub(crate) fn set_root(&mut self, root: Option<OccupancyNode>) {
        self.root = root.map(Box::new);
    }

    /// Total number of nodes.
    pub fn size(&self) -> usize {
        self.root().map_or(0, OccupancyNode::subtree_size)
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.root().map_or(0, OccupancyNode::leaf_count)
    }

    /// Finest key of a coordinate.
    #[inline]
    pub fn key(&self, coord: Point3) -> Option<VoxelKey> {
        self.codec.key(coord)
    }

    /// Key of a coordinate at `depth`.
    #[inline]
    pub fn coord_to_key(&self, coord: Point3, depth: u8) -> Option<VoxelKey> {
        self.codec.coord_to_key(coord, depth)
    }

    /// Center of the node addressed by `key` at `depth`.
    #[inline]
    pub fn key_to_coord(&self, key: VoxelKey, depth: u8) -> Point3 {
        self.codec.key_to_coord(key, depth)
    }

    /// Occupancy probability above 0.5. Independent of the clamps.
    #[inline]
    pub fn is_node_occupied(&self, node: &OccupancyNode) -> bool {
        node.is_occupied()
    }

    /// Deepest known node containing `key`, descending at most to `depth`.
    ///
    /// Returns `None` for unknown space. A pruned leaf above `depth` is
    /// returned as-is since it covers the requested voxel.
    pub fn search_key(&self, key: VoxelKey, depth: u8) -> Option<&OccupancyNode> {
        let depth = depth.min(self.max_depth());
        let mut node = self.root()?;
        for d in 0..depth {
            let pos = self.codec.child_index(key, d);
            match node.child(pos) {
                Some(child) => node = child,
                None if node.is_leaf() => return Some(node),
                None => return None,
            }
        }
        Some(node)
    }

    /// Finest known node containing `coord`.
    pub fn search(&self, coord: Point3) -> Option<&OccupancyNode> {
        let key = self.key(coord)?;
        self.search_key(key, self.max_depth())
    }

    /// Integrate one hit or miss at a finest key. Returns the new log-odds.
    pub fn update(&mut self, key: VoxelKey, occupied: bool) -> f64 {
        let model = self.model;
        let depth = self.max_depth();
        self.write_node(key, depth, |node| {
            node.set_log_odds(model.integrate(node.log_odds(), occupied));
        })
    }

    /// Integrate one hit or miss at a coordinate; `None` when out of range.
    pub fn update_coord(&mut self, coord: Point3, occupied: bool) -> Option<f64> {
        let key = self.key(coord)?;
        Some(self.update(key, occupied))
    }

    /// Write a log-odds value directly, bypassing the sensor model.
    ///
    /// The node at `depth` becomes a leaf: any children it had are dropped.
    pub fn set_node_value(&mut self, key: VoxelKey, log_odds: f64, depth: u8) {
        let depth = depth.min(self.max_depth());
        self.write_node(key, depth, |node| {
            node.clear_children();
            node.set_log_odds(log_odds);
        });
    }

    fn write_node<F>(&mut self, key: VoxelKey, depth: u8, mut write: F) -> f64
    where
        F: FnMut(&mut OccupancyNode),
    {
        let just_created = self.root.is_none();
        let codec = self.codec;
        let root = self
            .root
            .get_or_insert_with(|| Box::new(OccupancyNode::new(0.0)));
        write_recurs(root, just_created, &codec, key, 0, depth, &mut write)
    }

    /// Materialize the path to the node at `depth` containing `key`.
    ///
    /// Pruned leaves along the way are expanded so their value is kept by
    /// every child. Nodes created in unknown space start at 0.0. Inner values
    /// are not refreshed; follow up with [`prune`](Self::prune) or
    /// [`update_inner_occupancy`](Self::update_inner_occupancy).
    pub fn touch(&mut self, key: VoxelKey, depth: u8) -> &mut OccupancyNode {
        let depth = depth.min(self.max_depth());
        let codec = self.codec;
        let mut just_created = self.root.is_none();
        let mut node: &mut OccupancyNode = self
            .root
            .get_or_insert_with(|| Box::new(OccupancyNode::new(0.0)));
        for d in 0..depth {
            let pos = codec.child_index(key, d);
            let (child, created) = node.ensure_child(pos, !just_created);
            just_created = created;
            node = child;
        }
        node
    }

    /// Expand every leaf down to the finest depth.
    pub fn expand(&mut self) {
        let max_depth = self.max_depth();
        if let Some(root) = self.root.as_deref_mut() {
            root.expand_subtree(0, max_depth);
        }
    }

    /// Expand leaves overlapping `bbx` down to the finest depth.
    ///
    /// Children of an expanded leaf that fall outside the box stay as
    /// coarse leaves carrying the parent's value.
    pub fn expand_bbx(&mut self, bbx: &KeyBounds) {
        let codec = self.codec;
        if let Some(root) = self.root.as_deref_mut() {
            expand_bbx_recurs(root, &codec, VoxelKey::default(), 0, bbx);
        }
    }

    /// Collapse every complete octet of equal-valued leaves, bottom-up.
    ///
    /// Safe on an empty tree, idempotent, and never changes the value seen
    /// by a query for any voxel. Returns the number of nodes removed.
    pub fn prune(&mut self) -> usize {
        let removed = self
            .root
            .as_deref_mut()
            .map_or(0, OccupancyNode::prune_recursive);
        if removed > 0 {
            debug!("Pruned {} nodes", removed);
        }
        removed
    }

    /// [`prune`](Self::prune) limited to subtrees overlapping `bbx`.
    ///
    /// Undoes an [`expand_bbx`](Self::expand_bbx) over the same box. Returns
    /// the number of nodes removed.
    pub fn prune_bbx(&mut self, bbx: &KeyBounds) -> usize {
        let codec = self.codec;
        self.root
            .as_deref_mut()
            .map_or(0, |root| prune_bbx_recurs(root, &codec, VoxelKey::default(), 0, bbx))
    }

    /// Recompute every inner node's value as the max of its children.
    pub fn update_inner_occupancy(&mut self) {
        if let Some(root) = self.root.as_deref_mut() {
            root.update_inner_recursive();
        }
    }

    /// Remove the node at `depth` containing `key` with its subtree.
    ///
    /// A pruned ancestor is expanded first so only the addressed part is
    /// removed. Ancestors left without children are removed too. Returns
    /// `false` when the node was already unknown.
    pub fn delete_node(&mut self, key: VoxelKey, depth: u8) -> bool {
        let depth = depth.min(self.max_depth());
        let codec = self.codec;
        let Some(root) = self.root.as_deref_mut() else {
            return false;
        };
        match delete_recurs(root, &codec, key, 0, depth) {
            DeleteOutcome::RemoveSelf => {
                self.root = None;
                true
            }
            DeleteOutcome::Removed => true,
            DeleteOutcome::Missing => false,
        }
    }

    /// All leaves, depth-first.
    pub fn leaves(&self) -> LeafIter<'_> {
        LeafIter::new(self.codec, self.root(), None)
    }

    /// Leaves overlapping the inclusive key box `[min, max]`.
    pub fn leaves_in_bbx(&self, min: VoxelKey, max: VoxelKey) -> LeafIter<'_> {
        LeafIter::new(self.codec, self.root(), Some(KeyBounds::new(min, max)))
    }

    /// Leaves overlapping a coordinate box.
    pub fn leaves_in_bounds(&self, bounds: &Bounds3) -> LeafIter<'_> {
        match self.codec.bounds_to_keys(bounds) {
            Some(kb) => LeafIter::new(self.codec, self.root(), Some(kb)),
            None => LeafIter::new(self.codec, None, None),
        }
    }

    /// Metric extent of all known space; `None` on an empty tree.
    pub fn metric_bounds(&self) -> Option<Bounds3> {
        let mut bounds = Bounds3::empty();
        for leaf in self.leaves() {
            let half = leaf.size * 0.5;
            let h = Point3::new(half, half, half);
            bounds.expand_to_include(leaf.center - h);
            bounds.expand_to_include(leaf.center + h);
        }
        (!bounds.is_empty()).then_some(bounds)
    }

    /// Centers of occupied leaves.
    pub fn occupied_centers(&self) -> Vec<Point3> {
        self.leaves()
            .filter(Leaf::is_occupied)
            .map(|l| l.center)
            .collect()
    }

    /// Centers of free leaves.
    pub fn free_centers(&self) -> Vec<Point3> {
        self.leaves()
            .filter(|l| !l.is_occupied())
            .map(|l| l.center)
            .collect()
    }
}

fn write_recurs(
    node: &mut OccupancyNode,
    just_created: bool,
    codec: &KeyCodec,
    key: VoxelKey,
    depth: u8,
    target: u8,
    write: &mut dyn FnMut(&mut OccupancyNode),
) -> f64 {
    if depth >= target {
        write(node);
        return node.log_odds();
    }
    let pos = codec.child_index(key, depth);
    let (child, created) = node.ensure_child(pos, !just_created);
    let value = write_recurs(child, created, codec, key, depth + 1, target, write);
    node.update_from_children();
    value
}

fn expand_bbx_recurs(
    node: &mut OccupancyNode,
    codec: &KeyCodec,
    base: VoxelKey,
    depth: u8,
    bbx: &KeyBounds,
) {
    if depth >= codec.max_depth() || !codec.node_intersects(base, depth, bbx) {
        return;
    }
    node.expand();
    for pos in 0..8 {
        if let Some(child) = node.child_mut(pos) {
            let child_base = codec.child_base(base, depth, pos);
            expand_bbx_recurs(child, codec, child_base, depth + 1, bbx);
        }
    }
}

fn prune_bbx_recurs(
    node: &mut OccupancyNode,
    codec: &KeyCodec,
    base: VoxelKey,
    depth: u8,
    bbx: &KeyBounds,
) -> usize {
    if node.is_leaf() || !codec.node_intersects(base, depth, bbx) {
        return 0;
    }
    let mut removed = 0;
    for pos in 0..8 {
        if let Some(child) = node.child_mut(pos) {
            let child_base = codec.child_base(base, depth, pos);
            removed += prune_bbx_recurs(child, codec, child_base, depth + 1, bbx);
        }
    }
    if node.collapse() {
        removed += 8;
    } else {
        node.update_from_children();
    }
    removed
}

enum DeleteOutcome {
    RemoveSelf,
    Removed,
    Missing,
}

fn delete_recurs(
    node: &mut OccupancyNode,
    codec: &KeyCodec,
    key: VoxelKey,
    depth: u8,
    target: u8,
) -> DeleteOutcome {
    if depth >= target {
        return DeleteOutcome::RemoveSelf;
    }
    let pos = codec.child_index(key, depth);
    if !node.child_exists(pos) {
        if node.has_children() {
            return DeleteOutcome::Missing;
        }
        node.expand();
    }
    let outcome = match node.child_mut(pos) {
        Some(child) => delete_recurs(child, codec, key, depth + 1, target),
        None => DeleteOutcome::Missing,
    };
    match outcome {
        DeleteOutcome::RemoveSelf => {
            node.delete_child(pos);
            if node.is_leaf() {
                return DeleteOutcome::RemoveSelf;
            }
            node.update_from_children();
            DeleteOutcome::Removed
        }
        DeleteOutcome::Removed => {
            node.update_from_children();
            DeleteOutcome::Removed
        }
        DeleteOutcome::Missing => DeleteOutcome::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_tree() -> OccupancyOctree {
        OccupancyOctree::new(0.1, 16, SensorModel::default())
    }

    #[test]
    fn test_update_creates_path() {
        let mut tree = small_tree();
        assert!(tree.is_empty());
        let key = tree.key(Point3::new(1.0, 0.0, 0.0)).unwrap();
        let v = tree.update(key, true);
        assert_relative_eq!(v, tree.sensor_model().hit_log_odds());
        assert_eq!(tree.size(), 17);
        assert_eq!(tree.leaf_count(), 1);
        assert!(tree.search_key(key, 16).unwrap().is_occupied());
        // inner nodes carry the max of their children
        assert_relative_eq!(tree.root().unwrap().log_odds(), v);
    }

    #[test]
    fn test_update_clamps() {
        let mut tree = small_tree();
        let key = tree.key(Point3::ZERO).unwrap();
        for _ in 0..100 {
            tree.update(key, false);
        }
        let v = tree.search_key(key, 16).unwrap().log_odds();
        assert_relative_eq!(v, tree.sensor_model().clamp_min_log_odds());
        assert!(!tree.search_key(key, 16).unwrap().is_occupied());
    }

    #[test]
    fn test_search_unknown() {
        let mut tree = small_tree();
        assert!(tree.search(Point3::ZERO).is_none());
        tree.update_coord(Point3::ZERO, true);
        assert!(tree.search(Point3::new(5.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn test_set_node_value_coarse_then_update_keeps_block() {
        let mut tree = small_tree();
        let key = tree.key(Point3::new(0.05, 0.05, 0.05)).unwrap();
        // a uniform free block of 4x4x4 voxels
        tree.set_node_value(key, -1.0, 14);
        assert_eq!(tree.leaf_count(), 1);
        tree.update(key, true);
        // the block was expanded; siblings still carry -1.0
        let sibling = VoxelKey::new(key.x + 1, key.y, key.z);
        assert_relative_eq!(tree.search_key(sibling, 16).unwrap().log_odds(), -1.0);
        assert!(tree.search_key(key, 16).unwrap().log_odds() > -1.0);
    }

    #[test]
    fn test_touch_materializes_without_values() {
        let mut tree = small_tree();
        let key = tree.key(Point3::new(0.3, -0.2, 0.1)).unwrap();
        tree.touch(key, 16).set_log_odds(2.0);
        assert_eq!(tree.size(), 17);
        assert_relative_eq!(tree.search_key(key, 16).unwrap().log_odds(), 2.0);
    }

    #[test]
    fn test_prune_collapses_uniform_octet() {
        let mut tree = small_tree();
        let base = tree.key(Point3::ZERO).unwrap();
        for dx in 0..2 {
            for dy in 0..2 {
                for dz in 0..2 {
                    let k = VoxelKey::new(base.x + dx, base.y + dy, base.z + dz);
                    tree.set_node_value(k, 1.5, 16);
                }
            }
        }
        assert_eq!(tree.leaf_count(), 8);
        let removed = tree.prune();
        assert_eq!(removed, 8);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.prune(), 0);
        assert_relative_eq!(tree.search_key(base, 16).unwrap().log_odds(), 1.5);
    }

    #[test]
    fn test_prune_empty_tree() {
        let mut tree = small_tree();
        assert_eq!(tree.prune(), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_expand_restores_finest_leaves() {
        let mut tree = OccupancyOctree::new(1.0, 4, SensorModel::default());
        let key = VoxelKey::new(8, 8, 8);
        tree.set_node_value(key, 1.0, 2);
        assert_eq!(tree.leaf_count(), 1);
        tree.expand();
        assert_eq!(tree.leaf_count(), 64);
        assert!(tree.leaves().all(|l| l.depth == 4 && l.log_odds == 1.0));
    }

    #[test]
    fn test_expand_bbx_only_touches_box() {
        let mut tree = OccupancyOctree::new(1.0, 4, SensorModel::default());
        tree.set_node_value(VoxelKey::new(8, 8, 8), 1.0, 2);
        let bbx = KeyBounds::from_key(VoxelKey::new(8, 8, 8));
        tree.expand_bbx(&bbx);
        // 4x4x4 block: one octet expanded to finest, seven siblings stay coarse
        assert_eq!(tree.leaf_count(), 8 + 7);
    }

    #[test]
    fn test_prune_bbx_undoes_expand_bbx() {
        let mut tree = OccupancyOctree::new(1.0, 4, SensorModel::default());
        tree.set_node_value(VoxelKey::new(8, 8, 8), 1.0, 2);
        tree.set_node_value(VoxelKey::new(0, 0, 0), -1.0, 2);
        let bbx = KeyBounds::from_key(VoxelKey::new(8, 8, 8));
        tree.expand_bbx(&bbx);
        tree.expand_bbx(&KeyBounds::from_key(VoxelKey::new(0, 0, 0)));
        assert_eq!(tree.leaf_count(), 2 * (8 + 7));

        assert_eq!(tree.prune_bbx(&bbx), 16);
        // the other expanded block is outside the box and stays expanded
        assert_eq!(tree.leaf_count(), 1 + 8 + 7);
        assert_eq!(tree.search_key(VoxelKey::new(9, 9, 9), 4).unwrap().log_odds(), 1.0);
    }

    #[test]
    fn test_delete_node() {
        let mut tree = small_tree();
        let a = tree.key(Point3::new(0.0, 0.0, 0.0)).unwrap();
        let b = tree.key(Point3::new(3.0, 0.0, 0.0)).unwrap();
        tree.update(a, true);
        tree.update(b, true);
        assert!(tree.delete_node(a, 16));
        assert!(tree.search_key(a, 16).is_none());
        assert!(tree.search_key(b, 16).is_some());
        assert!(!tree.delete_node(a, 16));
        assert!(tree.delete_node(b, 16));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_delete_inside_pruned_block() {
        let mut tree = OccupancyOctree::new(1.0, 4, SensorModel::default());
        tree.set_node_value(VoxelKey::new(8, 8, 8), -1.0, 3);
        assert!(tree.delete_node(VoxelKey::new(8, 8, 8), 4));
        assert_eq!(tree.leaf_count(), 7);
    }

    #[test]
    fn test_metric_bounds() {
        let mut tree = small_tree();
        assert!(tree.metric_bounds().is_none());
        tree.update_coord(Point3::new(0.05, 0.05, 0.05), true);
        tree.update_coord(Point3::new(-0.95, 0.05, 0.05), false);
        let b = tree.metric_bounds().unwrap();
        assert_relative_eq!(b.min.x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(b.max.x, 0.1, epsilon = 1e-9);
        assert_relative_eq!(b.max.z, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_leaves_in_bbx() {
        let mut tree = small_tree();
        for i in 0..10 {
            tree.update_coord(Point3::new(i as f64 * 0.1 + 0.05, 0.05, 0.05), true);
        }
        let min = tree.key(Point3::new(0.2, 0.0, 0.0)).unwrap();
        let max = tree.key(Point3::new(0.45, 0.0, 0.0)).unwrap();
        let inside: Vec<_> = tree.leaves_in_bbx(min, max).collect();
        assert_eq!(inside.len(), 3);
        assert!(inside.iter().all(|l| l.key.within(&min, &max)));
        // restartable
        assert_eq!(tree.leaves().count(), 10);
        assert_eq!(tree.leaves().count(), 10);
    }
}
