//! Configuration loading for AkashaServer

use std::path::{Path, PathBuf};

use akasha_map::{ClassifierConfig, FreeRayPolicy, MapFormat, SensorModel};
use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, ServerError};

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub sensor_model: SensorModelConfig,
    #[serde(default)]
    pub unknown_rays: UnknownRaysConfig,
    #[serde(default)]
    pub global_map: GlobalMapConfig,
    #[serde(default)]
    pub local_map: LocalMapConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
}

/// Tree parameters
#[derive(Clone, Debug, Deserialize)]
pub struct MapConfig {
    /// Voxel edge length in meters (default: 0.05)
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Tree depth, 1..=16 (default: 16)
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,

    /// Prune after every inserted measurement (default: true)
    #[serde(default = "default_true")]
    pub compress: bool,
}

/// Sensor model parameters (probabilities)
#[derive(Clone, Debug, Deserialize)]
pub struct SensorModelConfig {
    /// Hit probability (default: 0.7)
    #[serde(default = "default_hit")]
    pub hit: f64,

    /// Miss probability (default: 0.4)
    #[serde(default = "default_miss")]
    pub miss: f64,

    /// Lower clamping probability (default: 0.12)
    #[serde(default = "default_clamp_min")]
    pub min: f64,

    /// Upper clamping probability (default: 0.97)
    #[serde(default = "default_clamp_max")]
    pub max: f64,

    /// Maximum range for free rays in meters, negative for unbounded (default: 20.0)
    #[serde(default = "default_max_range")]
    pub max_range: f64,
}

/// Free-space handling for directions without a return
#[derive(Clone, Debug, Deserialize)]
pub struct UnknownRaysConfig {
    /// Trace free space along probe directions (default: false)
    #[serde(default)]
    pub update_free_space: bool,

    /// Let probes clear voxels currently occupied in the map (default: false)
    #[serde(default)]
    pub clear_occupied: bool,

    /// Distance to which probes are traced in meters (default: 2.0)
    #[serde(default = "default_ray_distance")]
    pub ray_distance: f64,

    /// Free-ray conflict handling (default: truncate_at_occupied)
    #[serde(default)]
    pub free_ray_policy: FreeRayPolicy,
}

/// Global map publication and post-processing
#[derive(Clone, Debug, Deserialize)]
pub struct GlobalMapConfig {
    /// Publication rate in Hz (default: 1.0)
    #[serde(default = "default_global_rate")]
    pub publish_rate_hz: f64,

    /// Delete everything farther than `nearby_distance` from the sensor (default: false)
    #[serde(default)]
    pub keep_only_nearby: bool,

    /// Half extent of the kept cube in meters (default: 10.0)
    #[serde(default = "default_nearby_distance")]
    pub nearby_distance: f64,

    /// Force space around the sensor free after each insert (default: false)
    #[serde(default)]
    pub nearby_clearing: bool,

    /// Half extent of the cleared cube in meters (default: 0.3)
    #[serde(default = "default_clearing_distance")]
    pub clearing_distance: f64,
}

/// Local map window and time budget
#[derive(Clone, Debug, Deserialize)]
pub struct LocalMapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Nominal horizontal half extent in meters (default: 10.0)
    #[serde(default = "default_local_horizontal")]
    pub horizontal_distance: f64,

    /// Nominal vertical half extent in meters (default: 3.0)
    #[serde(default = "default_local_vertical")]
    pub vertical_distance: f64,

    /// Smallest horizontal half extent the controller may shrink to (default: 2.0)
    #[serde(default = "default_local_min_horizontal")]
    pub min_horizontal_distance: f64,

    /// Smallest vertical half extent the controller may shrink to (default: 1.0)
    #[serde(default = "default_local_min_vertical")]
    pub min_vertical_distance: f64,

    /// Extent change per adjustment in meters (default: 1.0)
    #[serde(default = "default_extent_step")]
    pub extent_step: f64,

    /// Rebuild rate in Hz (default: 2.0)
    #[serde(default = "default_local_rate")]
    pub rate_hz: f64,

    /// Fraction of the period a build may take (default: 0.5)
    #[serde(default = "default_duty_cycle")]
    pub max_duty_cycle: f64,
}

/// Periodic map snapshots on disk
#[derive(Clone, Debug, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between saves (default: 60.0)
    #[serde(default = "default_persistence_period")]
    pub period_secs: f64,

    /// Directory holding map files (default: "maps")
    #[serde(default = "default_map_directory")]
    pub directory: PathBuf,

    /// File stem of the canonical map (default: "map")
    #[serde(default = "default_map_name")]
    pub map_name: String,

    /// On-disk format: "full" (.ot) or "binary" (.bt) (default: full)
    #[serde(default = "default_map_format")]
    pub format: MapFormat,

    /// Load the canonical map at startup when it exists (default: false)
    #[serde(default)]
    pub load_on_start: bool,
}

/// One-shot ground alignment of a loaded map
#[derive(Clone, Debug, Deserialize)]
pub struct AlignmentConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Half width of the column searched for ground (default: 0.5)
    #[serde(default = "default_ground_radius")]
    pub ground_detection_radius: f64,

    /// Sensor height above ground when no measurement is available (default: 0.2)
    #[serde(default = "default_robot_height")]
    pub robot_height: f64,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_resolution() -> f64 {
    0.05
}
fn default_max_depth() -> u8 {
    16
}
fn default_hit() -> f64 {
    0.7
}
fn default_miss() -> f64 {
    0.4
}
fn default_clamp_min() -> f64 {
    0.12
}
fn default_clamp_max() -> f64 {
    0.97
}
fn default_max_range() -> f64 {
    20.0
}
fn default_ray_distance() -> f64 {
    2.0
}
fn default_global_rate() -> f64 {
    1.0
}
fn default_nearby_distance() -> f64 {
    10.0
}
fn default_clearing_distance() -> f64 {
    0.3
}

// Local map defaults
fn default_local_horizontal() -> f64 {
    10.0
}
fn default_local_vertical() -> f64 {
    3.0
}
fn default_local_min_horizontal() -> f64 {
    2.0
}
fn default_local_min_vertical() -> f64 {
    1.0
}
fn default_extent_step() -> f64 {
    1.0
}
fn default_local_rate() -> f64 {
    2.0
}
fn default_duty_cycle() -> f64 {
    0.5
}

// Persistence and alignment defaults
fn default_persistence_period() -> f64 {
    60.0
}
fn default_map_directory() -> PathBuf {
    PathBuf::from("maps")
}
fn default_map_name() -> String {
    "map".to_string()
}
fn default_map_format() -> MapFormat {
    MapFormat::Full
}
fn default_ground_radius() -> f64 {
    0.5
}
fn default_robot_height() -> f64 {
    0.2
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            max_depth: default_max_depth(),
            compress: true,
        }
    }
}

impl Default for SensorModelConfig {
    fn default() -> Self {
        Self {
            hit: default_hit(),
            miss: default_miss(),
            min: default_clamp_min(),
            max: default_clamp_max(),
            max_range: default_max_range(),
        }
    }
}

impl Default for UnknownRaysConfig {
    fn default() -> Self {
        Self {
            update_free_space: false,
            clear_occupied: false,
            ray_distance: default_ray_distance(),
            free_ray_policy: FreeRayPolicy::default(),
        }
    }
}

impl Default for GlobalMapConfig {
    fn default() -> Self {
        Self {
            publish_rate_hz: default_global_rate(),
            keep_only_nearby: false,
            nearby_distance: default_nearby_distance(),
            nearby_clearing: false,
            clearing_distance: default_clearing_distance(),
        }
    }
}

impl Default for LocalMapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            horizontal_distance: default_local_horizontal(),
            vertical_distance: default_local_vertical(),
            min_horizontal_distance: default_local_min_horizontal(),
            min_vertical_distance: default_local_min_vertical(),
            extent_step: default_extent_step(),
            rate_hz: default_local_rate(),
            max_duty_cycle: default_duty_cycle(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period_secs: default_persistence_period(),
            directory: default_map_directory(),
            map_name: default_map_name(),
            format: default_map_format(),
            load_on_start: false,
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ground_detection_radius: default_ground_radius(),
            robot_height: default_robot_height(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Reject unusable settings and normalize contradictory ones.
    ///
    /// Returns the adjustments made; each one is also logged as a warning.
    pub fn validate(&mut self) -> Result<Vec<String>> {
        if !(self.map.resolution.is_finite() && self.map.resolution > 0.0) {
            return Err(ServerError::Config(format!(
                "map.resolution must be positive, got {}",
                self.map.resolution
            )));
        }
        if self.map.max_depth == 0 || self.map.max_depth > akasha_map::MAX_TREE_DEPTH {
            return Err(ServerError::Config(format!(
                "map.max_depth must be in 1..={}, got {}",
                akasha_map::MAX_TREE_DEPTH,
                self.map.max_depth
            )));
        }
        if !self.to_sensor_model().is_valid() {
            return Err(ServerError::Config(format!(
                "sensor_model probabilities are inconsistent: {:?}",
                self.sensor_model
            )));
        }
        for (name, rate) in [
            ("global_map.publish_rate_hz", self.global_map.publish_rate_hz),
            ("local_map.rate_hz", self.local_map.rate_hz),
            ("local_map.max_duty_cycle", self.local_map.max_duty_cycle),
            ("persistence.period_secs", self.persistence.period_secs),
        ] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(ServerError::Config(format!(
                    "{} must be positive, got {}",
                    name, rate
                )));
            }
        }

        let mut adjustments = Vec::new();

        if self.unknown_rays.update_free_space && self.sensor_model.max_range < 0.0 {
            self.unknown_rays.update_free_space = false;
            adjustments.push(
                "Free-space update from missing returns needs a bounded sensor range; disabling it"
                    .to_string(),
            );
        }

        if self.global_map.keep_only_nearby
            && self.sensor_model.max_range >= 0.0
            && self.global_map.nearby_distance < self.sensor_model.max_range
        {
            adjustments.push(format!(
                "Nearby-only distance {:.2} m is below the sensor range; raising it to {:.2} m",
                self.global_map.nearby_distance, self.sensor_model.max_range
            ));
            self.global_map.nearby_distance = self.sensor_model.max_range;
        }

        let local = &mut self.local_map;
        if local.min_horizontal_distance > local.horizontal_distance {
            adjustments.push(format!(
                "Local map minimum horizontal extent {:.2} m exceeds nominal {:.2} m; clamping",
                local.min_horizontal_distance, local.horizontal_distance
            ));
            local.min_horizontal_distance = local.horizontal_distance;
        }
        if local.min_vertical_distance > local.vertical_distance {
            adjustments.push(format!(
                "Local map minimum vertical extent {:.2} m exceeds nominal {:.2} m; clamping",
                local.min_vertical_distance, local.vertical_distance
            ));
            local.min_vertical_distance = local.vertical_distance;
        }

        for msg in &adjustments {
            warn!("{}", msg);
        }
        Ok(adjustments)
    }

    /// Sensor model for the octree
    pub fn to_sensor_model(&self) -> SensorModel {
        SensorModel {
            prob_hit: self.sensor_model.hit,
            prob_miss: self.sensor_model.miss,
            clamp_min: self.sensor_model.min,
            clamp_max: self.sensor_model.max,
        }
    }

    /// Ray classification parameters
    pub fn to_classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            free_space_ray_len: (self.sensor_model.max_range >= 0.0)
                .then_some(self.sensor_model.max_range),
            policy: self.unknown_rays.free_ray_policy,
            update_free_space_on_miss: self.unknown_rays.update_free_space,
            clear_occupied_on_miss: self.unknown_rays.clear_occupied,
            probe_distance: self.unknown_rays.ray_distance,
        }
    }
}
