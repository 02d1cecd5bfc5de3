//! Octree node storage.
//!
//! Every node carries a log-odds value. Inner nodes additionally own a fixed
//! 8-slot child array; a node with no live children is a leaf. For inner
//! nodes the value is maintained as the maximum of the children, so a
//! coarse query errs on the side of "occupied".

/// Eight optional owned children, indexed by [`KeyCodec::child_index`](super::KeyCodec::child_index).
pub(crate) type Children = Box<[Option<Box<OccupancyNode>>; 8]>;

/// Two leaf values closer than this are considered equal when pruning.
pub const PRUNE_EPSILON: f64 = 1e-9;

fn empty_children() -> Children {
    Box::new([None, None, None, None, None, None, None, None])
}

/// A single octree node.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct OccupancyNode {
    log_odds: f64,
    children: Option<Children>,
}

impl OccupancyNode {
    /// Create a leaf with the given log-odds value.
    #[inline]
    pub fn new(log_odds: f64) -> Self {
        Self {
            log_odds,
            children: None,
        }
    }

    /// Stored log-odds value.
    #[inline]
    pub fn log_odds(&self) -> f64 {
        self.log_odds
    }

    /// Overwrite the stored log-odds value.
    #[inline]
    pub fn set_log_odds(&mut self, value: f64) {
        self.log_odds = value;
    }

    /// Occupancy probability above 0.5.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.log_odds > 0.0
    }

    /// True if at least one child slot is live.
    #[inline]
    pub fn has_children(&self) -> bool {
        self.children
            .as_ref()
            .is_some_and(|c| c.iter().any(Option::is_some))
    }

    /// A node is a leaf iff it has no live children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        !self.has_children()
    }

    /// True if child slot `pos` is live.
    #[inline]
    pub fn child_exists(&self, pos: usize) -> bool {
        self.child(pos).is_some()
    }

    /// Borrow child `pos`.
    #[inline]
    pub fn child(&self, pos: usize) -> Option<&OccupancyNode> {
        self.children.as_ref().and_then(|c| c[pos].as_deref())
    }

    /// Mutably borrow child `pos`.
    #[inline]
    pub fn child_mut(&mut self, pos: usize) -> Option<&mut OccupancyNode> {
        self.children.as_mut().and_then(|c| c[pos].as_deref_mut())
    }

    /// Iterate over live children with their slot index.
    pub fn children(&self) -> impl Iterator<Item = (usize, &OccupancyNode)> {
        self.children
            .iter()
            .flat_map(|c| c.iter().enumerate())
            .filter_map(|(i, c)| c.as_deref().map(|n| (i, n)))
    }

    /// Get child `pos`, creating it when absent.
    ///
    /// When the slot is empty and this node is a leaf standing in for a
    /// pruned block (`expand_leaf`), all eight children are materialized
    /// with this node's value first so the rest of the block is not lost.
    /// Otherwise a single unknown (0.0) child is created. Returns the child
    /// and whether it was freshly created as unknown.
    pub(crate) fn ensure_child(&mut self, pos: usize, expand_leaf: bool) -> (&mut OccupancyNode, bool) {
        if !self.child_exists(pos) && expand_leaf && self.is_leaf() {
            self.expand();
        }
        let children = self.children.get_or_insert_with(empty_children);
        let created = children[pos].is_none();
        let child = children[pos].get_or_insert_with(|| Box::new(OccupancyNode::new(0.0)));
        (&mut **child, created)
    }

    /// Install `child` in slot `pos`, replacing any previous subtree.
    pub(crate) fn set_child(&mut self, pos: usize, child: OccupancyNode) {
        let children = self.children.get_or_insert_with(empty_children);
        children[pos] = Some(Box::new(child));
    }

    /// Remove child `pos`. The child array is dropped once empty.
    pub(crate) fn delete_child(&mut self, pos: usize) {
        if let Some(children) = self.children.as_mut() {
            children[pos] = None;
            if children.iter().all(Option::is_none) {
                self.children = None;
            }
        }
    }

    /// Drop every child, turning this node into a leaf.
    pub(crate) fn clear_children(&mut self) {
        self.children = None;
    }

    /// Give a leaf eight children carrying its value. No-op on inner nodes.
    pub(crate) fn expand(&mut self) {
        if self.has_children() {
            return;
        }
        let value = self.log_odds;
        let mut children = empty_children();
        for slot in children.iter_mut() {
            *slot = Some(Box::new(OccupancyNode::new(value)));
        }
        self.children = Some(children);
    }

    /// Expand this node (at `depth`) and all descendant leaves down to
    /// `max_depth`; new children inherit their parent's value.
    pub fn expand_subtree(&mut self, depth: u8, max_depth: u8) {
        if depth >= max_depth {
            return;
        }
        self.expand();
        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut().flatten() {
                child.expand_subtree(depth + 1, max_depth);
            }
        }
    }

    /// Maximum value over live children.
    pub fn max_child_log_odds(&self) -> Option<f64> {
        self.children().map(|(_, c)| c.log_odds).reduce(f64::max)
    }

    /// Refresh an inner node's value from its children.
    #[inline]
    pub(crate) fn update_from_children(&mut self) {
        if let Some(max) = self.max_child_log_odds() {
            self.log_odds = max;
        }
    }

    /// All eight children present, all leaves, all with equal values.
    pub fn is_collapsible(&self) -> bool {
        let Some(children) = self.children.as_ref() else {
            return false;
        };
        let Some(first) = children[0].as_deref() else {
            return false;
        };
        if first.has_children() {
            return false;
        }
        children[1..].iter().all(|c| match c.as_deref() {
            Some(c) => !c.has_children() && (c.log_odds - first.log_odds).abs() <= PRUNE_EPSILON,
            None => false,
        })
    }

    /// Replace a collapsible child octet by this single leaf.
    pub(crate) fn collapse(&mut self) -> bool {
        if !self.is_collapsible() {
            return false;
        }
        if let Some(first) = self.child(0) {
            self.log_odds = first.log_odds;
        }
        self.children = None;
        true
    }

    /// Bottom-up prune of this subtree; returns the number of nodes removed.
    pub(crate) fn prune_recursive(&mut self) -> usize {
        let mut removed = 0;
        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut().flatten() {
                removed += child.prune_recursive();
            }
        }
        if self.collapse() {
            removed += 8;
        } else {
            self.update_from_children();
        }
        removed
    }

    /// Recompute inner values bottom-up.
    pub(crate) fn update_inner_recursive(&mut self) {
        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut().flatten() {
                child.update_inner_recursive();
            }
        }
        self.update_from_children();
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_size(&self) -> usize {
        1 + self.children().map(|(_, c)| c.subtree_size()).sum::<usize>()
    }

    /// Number of leaves in this subtree.
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children().map(|(_, c)| c.leaf_count()).sum()
        }
    }
}
