//! Classification of one measurement into occupied and free voxel sets.
//!
//! ## Rules
//!
//! 1. Every finite endpoint within the free-space ray length marks its
//!    voxel occupied.
//! 2. Each endpoint is pulled back to at most the free-space ray length and
//!    traced from the sensor origin; traversed voxels (end excluded) are free.
//! 3. Free-space probes (bearings with no return) are traced to the probe
//!    distance and contribute free voxels only.
//! 4. A voxel present in both sets is occupied.
//!
//! With [`FreeRayPolicy::TruncateAtOccupied`] a ray stops at the first voxel
//! already marked occupied in this batch, so a ray grazing a nearby obstacle
//! does not erase the space behind it. [`FreeRayPolicy::FullRay`] keeps the
//! whole ray.

use log::{trace, warn};
use serde::{Deserialize, Serialize};

use super::raycaster::KeyRay;
use crate::core::Point3;
use crate::octree::{KeyBounds, KeyCodec, KeySet, OccupancyOctree, VoxelKey};

/// How free rays treat voxels that are occupied in the same batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreeRayPolicy {
    /// Stop a free ray before the first voxel marked occupied in the batch
    #[default]
    TruncateAtOccupied,
    /// Insert every traversed voxel; only exact conflicts resolve to occupied
    FullRay,
}

/// Ray classification parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Maximum free-ray length in meters; `None` for unbounded
    #[serde(default = "default_free_space_ray_len")]
    pub free_space_ray_len: Option<f64>,

    /// Conflict handling for free rays
    #[serde(default)]
    pub policy: FreeRayPolicy,

    /// Trace free-space probes at all
    #[serde(default)]
    pub update_free_space_on_miss: bool,

    /// Let probes clear voxels currently occupied in the map
    #[serde(default)]
    pub clear_occupied_on_miss: bool,

    /// Distance to which probes are traced (meters)
    #[serde(default = "default_probe_distance")]
    pub probe_distance: f64,
}

fn default_free_space_ray_len() -> Option<f64> {
    Some(20.0)
}

fn default_probe_distance() -> f64 {
    2.0
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            free_space_ray_len: default_free_space_ray_len(),
            policy: FreeRayPolicy::default(),
            update_free_space_on_miss: false,
            clear_occupied_on_miss: false,
            probe_distance: default_probe_distance(),
        }
    }
}

impl ClassifierConfig {
    /// Free-space ray length as used for tracing; non-positive means unbounded.
    fn ray_len(&self) -> Option<f64> {
        self.free_space_ray_len.filter(|len| *len > 0.0)
    }
}

/// Output of one classification.
#[derive(Clone, Debug, Default)]
pub struct Classification {
    /// Voxels that receive a hit
    pub occupied: KeySet,
    /// Voxels that receive a miss (disjoint from `occupied`)
    pub free: KeySet,
    /// Key extent of the origin and all occupied voxels
    pub update_bounds: Option<KeyBounds>,
    /// Points skipped as non-finite or outside the key range
    pub rejected: usize,
}

impl Classification {
    fn mark_bounds(&mut self, key: VoxelKey) {
        match self.update_bounds.as_mut() {
            Some(b) => b.expand_to_include(key),
            None => self.update_bounds = Some(KeyBounds::from_key(key)),
        }
    }

    /// True if nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty() && self.free.is_empty()
    }
}

/// Turns measurements into occupied/free key sets for one tree.
#[derive(Clone, Debug, Default)]
pub struct RayClassifier {
    config: ClassifierConfig,
}

impl RayClassifier {
    /// Create a classifier.
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one measurement against `tree`.
    ///
    /// The tree supplies the key codec and, for probes, the current
    /// occupancy; it is not modified.
    pub fn classify(
        &self,
        tree: &OccupancyOctree,
        origin: Point3,
        points: &[Point3],
        probes: &[Point3],
    ) -> Classification {
        let mut out = Classification::default();
        let codec = tree.codec();

        let Some(origin_key) = (origin.is_finite()).then(|| codec.key(origin)).flatten() else {
            warn!("Sensor origin {:?} outside the map key range", origin);
            out.rejected = points.len() + probes.len();
            return out;
        };
        out.mark_bounds(origin_key);

        let ray_len = self.config.ray_len();

        // occupied pass: must be complete before any free ray is truncated
        let mut ray_ends = Vec::with_capacity(points.len());
        for &point in points {
            if !point.is_finite() {
                out.rejected += 1;
                continue;
            }
            let offset = point - origin;
            let distance = offset.norm();
            let end = match (ray_len, offset.normalized()) {
                (Some(len), Some(dir)) if distance > len => origin + dir * len,
                _ => point,
            };
            if ray_len.is_none_or(|len| distance < len) {
                match codec.key(point) {
                    Some(key) => {
                        out.occupied.insert(key);
                        out.mark_bounds(key);
                    }
                    None => {
                        out.rejected += 1;
                        continue;
                    }
                }
            }
            ray_ends.push(end);
        }

        for end in ray_ends {
            self.insert_free_ray(codec, origin, end, &mut out, None);
        }

        if self.config.update_free_space_on_miss {
            for &probe in probes {
                let Some(dir) = (probe - origin).normalized().filter(|d| d.is_finite()) else {
                    out.rejected += 1;
                    continue;
                };
                let end = origin + dir * self.config.probe_distance;
                let map = (!self.config.clear_occupied_on_miss).then_some(tree);
                self.insert_free_ray(codec, origin, end, &mut out, map);
            }
        }

        out.free.retain(|k| !out.occupied.contains(k));
        trace!(
            "Classified {} points: {} occupied, {} free, {} rejected",
            points.len(),
            out.occupied.len(),
            out.free.len(),
            out.rejected
        );
        out
    }

    fn insert_free_ray(
        &self,
        codec: &KeyCodec,
        origin: Point3,
        end: Point3,
        out: &mut Classification,
        map: Option<&OccupancyOctree>,
    ) {
        let Some(ray) = KeyRay::new(codec, origin, end) else {
            out.rejected += 1;
            return;
        };
        let truncate = self.config.policy == FreeRayPolicy::TruncateAtOccupied;
        for key in ray {
            if truncate && out.occupied.contains(&key) {
                break;
            }
            let occupied_in_map = map.is_some_and(|m| {
                m.search_key(key, m.max_depth())
                    .is_some_and(|n| n.is_occupied())
            });
            if occupied_in_map {
                break;
            }
            out.free.insert(key);
        }
    }
}
