//! Core geometric types shared by the octree, ray casting and region modules.

mod bounds;
mod point;

pub use bounds::Bounds3;
pub use point::Point3;
