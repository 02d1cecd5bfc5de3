//! Ray casting and measurement classification.
//!
//! - [`KeyRay`]: ordered voxel traversal between two points
//! - [`RayClassifier`]: sensor origin + endpoints + probes -> occupied/free sets

mod classifier;
mod raycaster;

pub use classifier::{Classification, ClassifierConfig, FreeRayPolicy, RayClassifier};
pub use raycaster::KeyRay;
