//! Discrete voxel keys and the coordinate codec.
//!
//! A [`VoxelKey`] addresses one voxel at the finest resolution. The key space
//! is centered on the map origin: key `2^(max_depth-1)` on each axis holds
//! the voxel whose lower corner is at coordinate `0.0`.
//!
//! ```text
//!   coord:  -2r   -r    0    r    2r
//!            |----|----|----|----|
//!   key:     c-2  c-1   c   c+1        (c = 2^(max_depth-1))
//! ```
//!
//! ## Depths and levels
//!
//! Depth is counted from the root: depth 0 is the root node covering the
//! whole key space, depth `max_depth` is the finest voxel. The *level* of a
//! node is the number of low key bits it ignores, `max_depth - depth`, so
//! level 0 is the finest resolution. A coarse key is derived from a fine key
//! by clearing those low bits and pointing at the center of the coarse cell.

use crate::core::{Bounds3, Point3};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Deepest tree supported by 16-bit keys.
pub const MAX_TREE_DEPTH: u8 = 16;

/// Integer voxel address at the finest resolution.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct VoxelKey {
    /// X key
    pub x: u16,
    /// Y key
    pub y: u16,
    /// Z key
    pub z: u16,
}

impl VoxelKey {
    /// Create a new key
    #[inline]
    pub const fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }

    /// Key component by axis index (0 = x, 1 = y, 2 = z)
    #[inline]
    pub fn axis(&self, i: usize) -> u16 {
        match i {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Mutable key component by axis index
    #[inline]
    pub fn axis_mut(&mut self, i: usize) -> &mut u16 {
        match i {
            0 => &mut self.x,
            1 => &mut self.y,
            _ => &mut self.z,
        }
    }

    /// True if every component lies within `[min, max]` (inclusive).
    #[inline]
    pub fn within(&self, min: &VoxelKey, max: &VoxelKey) -> bool {
        self.x >= min.x
            && self.x <= max.x
            && self.y >= min.y
            && self.y <= max.y
            && self.z >= min.z
            && self.z <= max.z
    }
}

/// Unordered set of keys produced by ray classification.
pub type KeySet = HashSet<VoxelKey>;

/// Inclusive box in key space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBounds {
    /// Minimum corner
    pub min: VoxelKey,
    /// Maximum corner
    pub max: VoxelKey,
}

impl KeyBounds {
    /// Create bounds from corners.
    #[inline]
    pub const fn new(min: VoxelKey, max: VoxelKey) -> Self {
        Self { min, max }
    }

    /// Bounds holding exactly one key.
    #[inline]
    pub fn from_key(key: VoxelKey) -> Self {
        Self::new(key, key)
    }

    /// Grow to include a key.
    pub fn expand_to_include(&mut self, key: VoxelKey) {
        self.min.x = self.min.x.min(key.x);
        self.min.y = self.min.y.min(key.y);
        self.min.z = self.min.z.min(key.z);
        self.max.x = self.max.x.max(key.x);
        self.max.y = self.max.y.max(key.y);
        self.max.z = self.max.z.max(key.z);
    }

    /// Union of two bounds.
    pub fn union(&self, other: &KeyBounds) -> KeyBounds {
        let mut out = *self;
        out.expand_to_include(other.min);
        out.expand_to_include(other.max);
        out
    }

    /// Inclusive membership test.
    #[inline]
    pub fn contains(&self, key: &VoxelKey) -> bool {
        key.within(&self.min, &self.max)
    }
}

/// Bidirectional mapping between coordinates and keys for one tree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyCodec {
    resolution: f64,
    max_depth: u8,
}

impl KeyCodec {
    /// Create a codec for a finest voxel size and tree depth.
    ///
    /// `max_depth` is clamped to `1..=MAX_TREE_DEPTH`.
    pub fn new(resolution: f64, max_depth: u8) -> Self {
        Self {
            resolution,
            max_depth: max_depth.clamp(1, MAX_TREE_DEPTH),
        }
    }

    /// Smallest depth whose key space spans `[-extent, extent)` on every axis.
    pub fn for_extent(resolution: f64, extent: f64) -> Self {
        let cells = (2.0 * extent.abs() / resolution).ceil().max(2.0);
        let depth = cells.log2().ceil() as i64;
        Self::new(resolution, depth.clamp(1, MAX_TREE_DEPTH as i64) as u8)
    }

    /// Finest voxel edge length in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Tree depth (number of levels below the root).
    #[inline]
    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    /// Key of the voxel whose lower corner is at coordinate 0.
    #[inline]
    pub fn center_key(&self) -> u32 {
        1u32 << (self.max_depth - 1)
    }

    /// Largest valid key component.
    #[inline]
    pub fn max_key(&self) -> u32 {
        (1u32 << self.max_depth) - 1
    }

    /// Edge length of a node at `depth`.
    #[inline]
    pub fn node_size(&self, depth: u8) -> f64 {
        self.resolution * (1u64 << (self.max_depth - depth.min(self.max_depth))) as f64
    }

    /// Metric half-range representable on each axis.
    pub fn half_range(&self) -> f64 {
        self.resolution * self.center_key() as f64
    }

    fn scaled_cell(&self, c: f64) -> Option<i64> {
        let cell = (c / self.resolution).floor();
        if cell.is_finite() {
            Some(cell as i64 + self.center_key() as i64)
        } else {
            None
        }
    }

    /// Finest key component for one coordinate, `None` when out of range.
    pub fn coord_to_key_axis(&self, c: f64) -> Option<u16> {
        let k = self.scaled_cell(c)?;
        if k < 0 || k > self.max_key() as i64 {
            None
        } else {
            Some(k as u16)
        }
    }

    /// Key component saturated to the representable range.
    fn coord_to_key_axis_clamped(&self, c: f64) -> u16 {
        if c.is_nan() {
            return self.center_key() as u16;
        }
        match self.scaled_cell(c) {
            Some(k) => k.clamp(0, self.max_key() as i64) as u16,
            None if c > 0.0 => self.max_key() as u16,
            None => 0,
        }
    }

    /// Key of the voxel containing `coord` at `depth`.
    ///
    /// Returns `None` when the coordinate lies outside the representable
    /// range. At coarser depths the returned key addresses the center of
    /// the enclosing node.
    pub fn coord_to_key(&self, coord: Point3, depth: u8) -> Option<VoxelKey> {
        let key = VoxelKey::new(
            self.coord_to_key_axis(coord.x)?,
            self.coord_to_key_axis(coord.y)?,
            self.coord_to_key_axis(coord.z)?,
        );
        Some(self.key_at_depth(key, depth))
    }

    /// Finest-depth key of `coord`.
    #[inline]
    pub fn key(&self, coord: Point3) -> Option<VoxelKey> {
        self.coord_to_key(coord, self.max_depth)
    }

    /// Adjust a finest key to address the node at `depth` containing it.
    pub fn key_at_depth(&self, key: VoxelKey, depth: u8) -> VoxelKey {
        if depth >= self.max_depth {
            return key;
        }
        let shift = (self.max_depth - depth) as u32;
        let adjust = |k: u16| -> u16 {
            let k = k as u32;
            let coarse = ((k >> shift) << shift) + (1u32 << (shift - 1));
            coarse.min(self.max_key()) as u16
        };
        VoxelKey::new(adjust(key.x), adjust(key.y), adjust(key.z))
    }

    /// Center coordinate of one key component at `depth`.
    pub fn key_to_coord_axis(&self, k: u16, depth: u8) -> f64 {
        let depth = depth.min(self.max_depth);
        if depth == 0 {
            return 0.0;
        }
        let offset = k as i64 - self.center_key() as i64;
        if depth == self.max_depth {
            return (offset as f64 + 0.5) * self.resolution;
        }
        let shift = (self.max_depth - depth) as u32;
        ((offset >> shift) as f64 + 0.5) * self.node_size(depth)
    }

    /// Center coordinate of the node addressed by `key` at `depth`.
    pub fn key_to_coord(&self, key: VoxelKey, depth: u8) -> Point3 {
        Point3::new(
            self.key_to_coord_axis(key.x, depth),
            self.key_to_coord_axis(key.y, depth),
            self.key_to_coord_axis(key.z, depth),
        )
    }

    /// Index (0..8) of the child of the node at `depth` that contains `key`.
    ///
    /// Bit 0 is x, bit 1 is y, bit 2 is z.
    #[inline]
    pub fn child_index(&self, key: VoxelKey, depth: u8) -> usize {
        let pos = self.max_depth - 1 - depth;
        let bit = |k: u16| ((k >> pos) & 1) as usize;
        bit(key.x) | (bit(key.y) << 1) | (bit(key.z) << 2)
    }

    /// Lower corner key of child `index` of a node with lower corner `base`
    /// at `depth`.
    #[inline]
    pub fn child_base(&self, base: VoxelKey, depth: u8, index: usize) -> VoxelKey {
        let half = 1u32 << (self.max_depth - 1 - depth);
        let step = |k: u16, bit: usize| -> u16 {
            if index & bit != 0 {
                (k as u32 + half) as u16
            } else {
                k
            }
        };
        VoxelKey::new(step(base.x, 1), step(base.y, 2), step(base.z, 4))
    }

    /// Key-space span of a node at `depth` (number of finest keys per axis).
    #[inline]
    pub fn span(&self, depth: u8) -> u32 {
        1u32 << (self.max_depth - depth.min(self.max_depth))
    }

    /// True if the node at `depth` with lower corner `base` overlaps `bbx`.
    pub fn node_intersects(&self, base: VoxelKey, depth: u8, bbx: &KeyBounds) -> bool {
        let last = self.span(depth) - 1;
        (0..3).all(|i| {
            let lo = base.axis(i) as u32;
            lo <= bbx.max.axis(i) as u32 && lo + last >= bbx.min.axis(i) as u32
        })
    }

    /// Inclusive key box covering a coordinate box.
    ///
    /// Corners outside the representable range are saturated; `None` when
    /// the box is empty or lies entirely outside the key space.
    pub fn bounds_to_keys(&self, bounds: &Bounds3) -> Option<KeyBounds> {
        if bounds.is_empty() {
            return None;
        }
        let half = self.half_range();
        for i in 0..3 {
            if bounds.max.axis(i) < -half || bounds.min.axis(i) >= half {
                return None;
            }
        }
        let min = VoxelKey::new(
            self.coord_to_key_axis_clamped(bounds.min.x),
            self.coord_to_key_axis_clamped(bounds.min.y),
            self.coord_to_key_axis_clamped(bounds.min.z),
        );
        let max = VoxelKey::new(
            self.coord_to_key_axis_clamped(bounds.max.x),
            self.coord_to_key_axis_clamped(bounds.max.y),
            self.coord_to_key_axis_clamped(bounds.max.z),
        );
        Some(KeyBounds::new(min, max))
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(0.05, MAX_TREE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_origin_key_is_center() {
        let codec = KeyCodec::new(0.1, 16);
        let key = codec.key(Point3::new(0.01, 0.01, 0.01)).unwrap();
        assert_eq!(key, VoxelKey::new(32768, 32768, 32768));

        let key = codec.key(Point3::new(-0.01, 0.0, 0.0)).unwrap();
        assert_eq!(key.x, 32767);
    }

    #[test]
    fn test_round_trip_within_half_voxel() {
        let codec = KeyCodec::new(0.05, 16);
        for &c in &[0.0, 0.024, -0.026, 3.21, -100.0, 1234.5678] {
            let p = Point3::new(c, -c, c * 0.5);
            let key = codec.key(p).unwrap();
            let back = codec.key_to_coord(key, 16);
            assert!((back.x - p.x).abs() <= 0.025 + 1e-9);
            assert!((back.y - p.y).abs() <= 0.025 + 1e-9);
            assert!((back.z - p.z).abs() <= 0.025 + 1e-9);
        }
    }

    #[test]
    fn test_out_of_range() {
        let codec = KeyCodec::new(0.1, 16);
        let limit = codec.half_range();
        assert!(codec.key(Point3::new(limit + 1.0, 0.0, 0.0)).is_none());
        assert!(codec.key(Point3::new(-limit - 1.0, 0.0, 0.0)).is_none());
        assert!(codec.key(Point3::new(f64::NAN, 0.0, 0.0)).is_none());
        assert!(codec.key(Point3::new(limit - 0.05, 0.0, 0.0)).is_some());
    }

    #[test]
    fn test_coarse_key_and_coord() {
        let codec = KeyCodec::new(1.0, 4);
        // center 8, keys 0..16
        let key = VoxelKey::new(13, 2, 8);
        let coarse = codec.key_at_depth(key, 2);
        // level 2: cells of 4 keys, centered at base + 2
        assert_eq!(coarse, VoxelKey::new(14, 2, 10));
        let c = codec.key_to_coord(key, 2);
        assert_relative_eq!(c.x, 6.0);
        assert_relative_eq!(c.y, -6.0);
        assert_relative_eq!(c.z, 2.0);
        assert_eq!(codec.key_to_coord(key, 0), Point3::ZERO);
    }

    #[test]
    fn test_child_index() {
        let codec = KeyCodec::new(1.0, 2);
        // keys 0..4, root splits on bit 1
        assert_eq!(codec.child_index(VoxelKey::new(0, 0, 0), 0), 0);
        assert_eq!(codec.child_index(VoxelKey::new(2, 0, 0), 0), 1);
        assert_eq!(codec.child_index(VoxelKey::new(0, 3, 0), 0), 2);
        assert_eq!(codec.child_index(VoxelKey::new(3, 3, 3), 0), 7);
        assert_eq!(codec.child_index(VoxelKey::new(3, 2, 1), 1), 0b101);
    }

    #[test]
    fn test_child_base() {
        let codec = KeyCodec::new(1.0, 4);
        let base = VoxelKey::new(0, 0, 0);
        assert_eq!(codec.child_base(base, 0, 0b111), VoxelKey::new(8, 8, 8));
        assert_eq!(codec.child_base(base, 2, 0b010), VoxelKey::new(0, 2, 0));
    }

    #[test]
    fn test_for_extent() {
        let codec = KeyCodec::for_extent(0.1, 10.0);
        // 200 cells -> 2^8
        assert_eq!(codec.max_depth(), 8);
        assert!(codec.half_range() >= 10.0);
        assert_eq!(KeyCodec::for_extent(0.01, 1.0e9).max_depth(), MAX_TREE_DEPTH);
    }

    #[test]
    fn test_bounds_to_keys_saturates() {
        let codec = KeyCodec::new(1.0, 4);
        let b = Bounds3::new(
            Point3::new(-1.0, -100.0, 0.0),
            Point3::new(1.5, 100.0, f64::INFINITY),
        );
        let kb = codec.bounds_to_keys(&b).unwrap();
        assert_eq!(kb.min, VoxelKey::new(7, 0, 8));
        assert_eq!(kb.max, VoxelKey::new(9, 15, 15));

        let outside = Bounds3::cube(Point3::new(100.0, 0.0, 0.0), 1.0);
        assert!(codec.bounds_to_keys(&outside).is_none());
    }
}
