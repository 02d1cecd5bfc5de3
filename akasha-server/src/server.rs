//! Map server control surface.
//!
//! [`MapServer`] owns the shared state and exposes the operations a host
//! process needs: measurement insertion, robot state updates, reset,
//! save/load by name, box clearing and map export. Worker threads in
//! [`crate::threads`] drive the periodic tasks against the same state.

use std::path::PathBuf;
use std::sync::Arc;

use akasha_map::io::{to_binary_bytes, to_full_bytes};
use akasha_map::{
    Bounds3, LoadedMap, MapFormat, MapMetadata, MapSnapshot, OccupancyOctree, UpdateStats, region,
};
use tracing::{info, warn};

use crate::alignment::{AlignmentOutcome, GroundAligner};
use crate::config::ServerConfig;
use crate::diagnostics::RobotState;
use crate::error::Result;
use crate::ingest::{Measurement, MeasurementHandler};
use crate::persistence::MapStore;
use crate::shared::SharedMapState;

/// Octree mapping server.
pub struct MapServer {
    config: ServerConfig,
    state: Arc<SharedMapState>,
    handler: MeasurementHandler,
    store: MapStore,
    aligner: GroundAligner,
}

impl MapServer {
    /// Validate `config` and create a server with empty maps.
    ///
    /// With `persistence.load_on_start` the default map is loaded; a missing
    /// or unreadable file is logged and the server starts empty.
    pub fn new(mut config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let global = OccupancyOctree::new(
            config.map.resolution,
            config.map.max_depth,
            config.to_sensor_model(),
        );
        let local = global.empty_like();
        let state = Arc::new(SharedMapState::new(global, local));

        let server = Self {
            handler: MeasurementHandler::new(&config, Arc::clone(&state)),
            store: MapStore::from_config(&config.persistence),
            aligner: GroundAligner::new(&config.alignment),
            state,
            config,
        };

        if server.config.persistence.load_on_start {
            match server.store.load() {
                Ok(loaded) => server.install(loaded),
                Err(e) => warn!("Starting with an empty map: {}", e),
            }
        }

        info!(
            "Map server ready: resolution {:.3} m, depth {}",
            server.config.map.resolution, server.config.map.max_depth
        );
        Ok(server)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedMapState> {
        &self.state
    }

    pub fn store(&self) -> &MapStore {
        &self.store
    }

    pub fn handler(&self) -> &MeasurementHandler {
        &self.handler
    }

    pub fn aligner(&self) -> &GroundAligner {
        &self.aligner
    }

    /// Integrate one measurement into the global map.
    pub fn insert(&self, measurement: &Measurement) -> Option<UpdateStats> {
        self.handler.handle(measurement)
    }

    /// Record the latest robot state.
    pub fn update_robot(&self, robot: RobotState) {
        self.state.set_robot(robot);
    }

    /// Drop every voxel of both maps and reopen integration.
    ///
    /// A pending alignment is cancelled: there is no map left to align.
    pub fn reset(&self) {
        {
            let (mut global, mut local) = self.state.lock_both();
            global.clear();
            local.clear();
            self.state.reset_update_bounds(None);
            self.state.finish_alignment();
        }
        info!("Map reset");
    }

    /// Mark every voxel inside `bounds` free. Returns the number of leaves
    /// changed.
    pub fn clear_bbx(&self, bounds: &Bounds3) -> usize {
        let cleared = region::clear_bbx(&mut self.state.lock_global(), bounds);
        info!("Cleared {} leaves in {:?}", cleared, bounds);
        cleared
    }

    /// Save the global map under the configured name.
    pub fn save(&self) -> Result<PathBuf> {
        let global = self.state.lock_global();
        self.store.save(&global)
    }

    /// Save the global map under `name`.
    pub fn save_as(&self, name: &str) -> Result<PathBuf> {
        let global = self.state.lock_global();
        self.store.save_as(&global, name)
    }

    /// Replace the global map with the map stored under `name`.
    ///
    /// On failure the active maps are left untouched. On success the local
    /// map is emptied, the update box is taken from the loaded map and, if
    /// alignment is enabled, integration pauses until the map is aligned.
    pub fn load_from(&self, name: &str) -> Result<MapMetadata> {
        let loaded = self.store.load_from(name)?;
        let metadata = loaded.metadata.clone();
        self.install(loaded);
        Ok(metadata)
    }

    fn install(&self, loaded: LoadedMap) {
        let align = self.config.alignment.enabled;
        {
            let (mut global, mut local) = self.state.lock_both();
            // close the gate before releasing the trees
            if align {
                self.state.arm_alignment();
            }
            *global = loaded.tree;
            *local = global.empty_like();
            self.state.reset_update_bounds(loaded.metadata.update_bounds);
        }
        if align {
            info!("Map loaded, waiting for ground alignment");
        }
    }

    /// Run a pending ground alignment now.
    pub fn align(&self) -> Option<AlignmentOutcome> {
        self.aligner.run_pending(&self.state)
    }

    /// Leaf export of the global map.
    pub fn global_snapshot(&self) -> MapSnapshot {
        MapSnapshot::from_tree(&self.state.lock_global())
    }

    /// Leaf export of the local map.
    pub fn local_snapshot(&self) -> MapSnapshot {
        MapSnapshot::from_tree(&self.state.lock_local())
    }

    /// Serialize the global map in `format`.
    pub fn export_global(&self, format: MapFormat) -> Result<Vec<u8>> {
        let global = self.state.lock_global();
        let bytes = match format {
            MapFormat::Full => to_full_bytes(&global)?,
            MapFormat::Binary => to_binary_bytes(&global)?,
        };
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use akasha_map::Point3;

    fn config(dir: &std::path::Path) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.map.resolution = 0.1;
        config.persistence.directory = dir.to_path_buf();
        config
    }

    fn wall() -> Measurement {
        let points = (0..5)
            .map(|i| Point3::new(1.05, -0.25 + 0.1 * i as f64, 0.05))
            .collect();
        Measurement::new(Point3::new(0.05, 0.05, 0.05), points)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = ServerConfig::default();
        config.map.resolution = 0.0;
        assert!(matches!(MapServer::new(config), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let server = MapServer::new(config(dir.path())).unwrap();
        server.insert(&wall()).unwrap();
        assert!(!server.global_snapshot().is_empty());

        server.reset();
        assert!(server.global_snapshot().is_empty());
        assert!(server.state().update_bounds().is_none());
    }

    #[test]
    fn test_failed_load_keeps_map() {
        let dir = tempfile::tempdir().unwrap();
        let server = MapServer::new(config(dir.path())).unwrap();
        server.insert(&wall()).unwrap();
        let before = server.global_snapshot();

        assert!(server.load_from("missing").is_err());
        assert_eq!(server.global_snapshot(), before);
        assert!(server.state().is_initialized());
    }

    #[test]
    fn test_load_arms_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.alignment.enabled = true;
        let server = MapServer::new(config).unwrap();
        server.insert(&wall()).unwrap();
        server.save_as("saved").unwrap();
        server.reset();

        let metadata = server.load_from("saved").unwrap();
        assert!(metadata.leaf_count > 0);
        assert!(metadata.update_bounds.is_some());
        assert!(server.state().is_alignment_pending());
        assert!(!server.state().is_initialized());
        assert!(server.insert(&wall()).is_none());
    }

    #[test]
    fn test_reset_reopens_inserts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.alignment.enabled = true;
        let server = MapServer::new(config).unwrap();
        server.insert(&wall()).unwrap();
        server.save_as("saved").unwrap();
        server.load_from("saved").unwrap();
        assert!(!server.state().is_initialized());

        server.reset();
        assert!(server.state().is_initialized());
        assert!(!server.state().is_alignment_pending());
        assert!(server.insert(&wall()).is_some());
        assert!(server.align().is_none());
    }

    #[test]
    fn test_clear_bbx() {
        let dir = tempfile::tempdir().unwrap();
        let server = MapServer::new(config(dir.path())).unwrap();
        server.insert(&wall()).unwrap();

        let cleared = server.clear_bbx(&Bounds3::cube(Point3::new(1.05, 0.05, 0.05), 0.5));
        assert!(cleared > 0);
        assert_eq!(server.global_snapshot().occupied_count(), 0);
    }

    #[test]
    fn test_export_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let server = MapServer::new(config(dir.path())).unwrap();
        server.insert(&wall()).unwrap();

        let bytes = server.export_global(MapFormat::Full).unwrap();
        let tree = akasha_map::io::from_full_bytes(&bytes).unwrap();
        assert_eq!(MapSnapshot::from_tree(&tree), server.global_snapshot());
    }
}
