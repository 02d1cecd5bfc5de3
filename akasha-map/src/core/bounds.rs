//! Axis-aligned bounding box in map coordinates.
//!
//! [`Bounds3`] is used for:
//! - Region extraction (local map window around the robot)
//! - Region clearing (clear box, keep-only-nearby)
//! - Update extent tracking (what volume has changed)
//!
//! # Usage
//!
//! ```rust
//! use akasha_map::core::{Bounds3, Point3};
//!
//! let window = Bounds3::around(Point3::new(1.0, 2.0, 0.5), 5.0, 2.0);
//! assert!(window.contains(Point3::new(3.0, 4.0, 1.0)));
//!
//! let mut extent = Bounds3::empty();
//! extent.expand_to_include(Point3::new(1.0, 1.0, 0.0));
//! extent.expand_to_include(Point3::new(-2.0, 3.0, 1.0));
//! assert_eq!(extent.min, Point3::new(-2.0, 1.0, 0.0));
//! ```

use super::point::Point3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box (inclusive on both corners).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Bounds3 {
    /// Create a new bounding box from min and max corners.
    #[inline]
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (invalid) bounding box that expands to fit any point.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Box centered on `center` with the given horizontal (x, y) and vertical
    /// (z) half extents.
    #[inline]
    pub fn around(center: Point3, horizontal: f64, vertical: f64) -> Self {
        let half = Point3::new(horizontal, horizontal, vertical);
        Self::new(center - half, center + half)
    }

    /// Cube centered on `center` with the given half extent on every axis.
    #[inline]
    pub fn cube(center: Point3, half_extent: f64) -> Self {
        Self::around(center, half_extent, half_extent)
    }

    /// Check if the bounds are empty (invalid).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Extent along each axis.
    #[inline]
    pub fn size(&self) -> Point3 {
        self.max - self.min
    }

    /// Center of the box.
    #[inline]
    pub fn center(&self) -> Point3 {
        (self.min + self.max) * 0.5
    }

    /// Check if a point is inside (inclusive).
    #[inline]
    pub fn contains(&self, p: Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Check if two boxes overlap.
    #[inline]
    pub fn intersects(&self, other: &Bounds3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Grow the box to include a point.
    #[inline]
    pub fn expand_to_include(&mut self, p: Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Bounds3) -> Bounds3 {
        let mut out = *self;
        if !other.is_empty() {
            out.expand_to_include(other.min);
            out.expand_to_include(other.max);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_expands() {
        let mut b = Bounds3::empty();
        assert!(b.is_empty());
        b.expand_to_include(Point3::new(1.0, 2.0, 3.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, b.max);
    }

    #[test]
    fn test_around_contains_inclusive() {
        let b = Bounds3::around(Point3::ZERO, 1.0, 0.5);
        assert!(b.contains(Point3::new(1.0, -1.0, 0.5)));
        assert!(!b.contains(Point3::new(0.0, 0.0, 0.51)));
    }

    #[test]
    fn test_intersects() {
        let a = Bounds3::cube(Point3::ZERO, 1.0);
        let b = Bounds3::cube(Point3::new(1.5, 0.0, 0.0), 1.0);
        let c = Bounds3::cube(Point3::new(5.0, 0.0, 0.0), 1.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
