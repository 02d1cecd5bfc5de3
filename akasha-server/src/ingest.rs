//! Measurement ingestion into the global map.
//!
//! Measurements arrive already transformed into the map frame. Readings
//! whose transform could not be resolved are dropped upstream and never
//! reach this module.

use std::sync::Arc;
use std::time::Instant;

use akasha_map::region::{clear_inside_bbx, clear_outside_bbx};
use akasha_map::{Bounds3, Point3, RayClassifier, UpdateStats, update};
use tracing::{debug, trace};

use crate::config::ServerConfig;
use crate::diagnostics::may_integrate;
use crate::shared::SharedMapState;

/// One range measurement in the map frame.
#[derive(Clone, Debug)]
pub struct Measurement {
    /// Sensor origin
    pub origin: Point3,
    /// Measured endpoints
    pub points: Vec<Point3>,
    /// Directions without a return, as points along each bearing
    pub free_probes: Vec<Point3>,
    /// Acquisition time
    pub stamp: Instant,
}

impl Measurement {
    /// Measurement without free-space probes.
    pub fn new(origin: Point3, points: Vec<Point3>) -> Self {
        Self {
            origin,
            points,
            free_probes: Vec::new(),
            stamp: Instant::now(),
        }
    }

    /// Attach free-space probes.
    pub fn with_probes(mut self, probes: Vec<Point3>) -> Self {
        self.free_probes = probes;
        self
    }
}

/// Nearby-only and nearby-clearing settings applied after each insert.
#[derive(Clone, Copy, Debug, Default)]
struct PostProcess {
    keep_within: Option<f64>,
    clear_within: Option<f64>,
}

/// Classifies measurements and fuses them into the global tree.
#[derive(Clone, Debug)]
pub struct MeasurementHandler {
    state: Arc<SharedMapState>,
    classifier: RayClassifier,
    compress: bool,
    post: PostProcess,
}

impl MeasurementHandler {
    /// Create a handler from configuration.
    pub fn new(config: &ServerConfig, state: Arc<SharedMapState>) -> Self {
        let global = &config.global_map;
        Self {
            state,
            classifier: RayClassifier::new(config.to_classifier_config()),
            compress: config.map.compress,
            post: PostProcess {
                keep_within: global.keep_only_nearby.then_some(global.nearby_distance),
                clear_within: global.nearby_clearing.then_some(global.clearing_distance),
            },
        }
    }

    /// Integrate one measurement.
    ///
    /// Returns `None` when the measurement was dropped by the gates: map not
    /// initialized, or vehicle taking off or landing. Dropped measurements
    /// are not queued. The initialized gate is checked again once the global
    /// tree is locked, so a map swapped in by a load is never updated before
    /// it is aligned.
    pub fn handle(&self, measurement: &Measurement) -> Option<UpdateStats> {
        if !self.state.is_initialized() {
            trace!("Map not initialized, dropping measurement");
            return None;
        }
        if !may_integrate(self.state.diagnostics().as_ref()) {
            debug!("Vehicle taking off or landing, dropping measurement");
            return None;
        }

        let start = Instant::now();
        let stats = {
            let mut global = self.state.lock_global();
            if !self.state.is_initialized() {
                trace!("Map replaced while waiting, dropping measurement");
                return None;
            }
            let stats = update::insert_measurement(
                &mut global,
                &self.classifier,
                measurement.origin,
                &measurement.points,
                &measurement.free_probes,
                self.compress,
            );

            if let Some(distance) = self.post.keep_within {
                let kept = Bounds3::cube(measurement.origin, distance);
                clear_outside_bbx(&mut global, &kept);
            }
            if let Some(distance) = self.post.clear_within {
                let cleared = Bounds3::cube(measurement.origin, distance);
                clear_inside_bbx(&mut global, &cleared);
            }
            stats
        };

        if let Some(bounds) = stats.update_bounds {
            self.state.expand_update_bounds(bounds);
        }
        trace!(
            "Measurement with {} points integrated in {:.1} ms ({} free, {} occupied)",
            measurement.points.len(),
            start.elapsed().as_secs_f64() * 1000.0,
            stats.cells_free,
            stats.cells_occupied
        );
        Some(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{FlightState, RobotState, VehicleDiagnostics};
    use akasha_map::OccupancyOctree;

    fn setup(config: &ServerConfig) -> (Arc<SharedMapState>, MeasurementHandler) {
        let tree = OccupancyOctree::new(0.1, 16, config.to_sensor_model());
        let state = Arc::new(SharedMapState::new(tree.clone(), tree));
        let handler = MeasurementHandler::new(config, Arc::clone(&state));
        (state, handler)
    }

    fn wall_measurement() -> Measurement {
        let points = (0..10)
            .map(|i| Point3::new(2.05, -0.45 + 0.1 * i as f64, 0.55))
            .collect();
        Measurement::new(Point3::new(0.05, 0.05, 0.55), points)
    }

    #[test]
    fn test_handle_updates_global() {
        let (state, handler) = setup(&ServerConfig::default());
        let stats = handler.handle(&wall_measurement()).unwrap();
        assert_eq!(stats.cells_occupied, 10);
        assert!(stats.cells_free > 0);
        assert!(state.lock_global().search(Point3::new(2.05, 0.05, 0.55)).unwrap().is_occupied());
        assert!(state.update_bounds().is_some());
    }

    #[test]
    fn test_drop_when_not_initialized() {
        let (state, handler) = setup(&ServerConfig::default());
        state.set_initialized(false);
        assert!(handler.handle(&wall_measurement()).is_none());
        assert!(state.lock_global().is_empty());
    }

    #[test]
    fn test_drop_when_map_replaced_while_waiting() {
        let (state, handler) = setup(&ServerConfig::default());
        std::thread::scope(|s| {
            let global = state.lock_global();
            let pending = s.spawn(|| handler.handle(&wall_measurement()));
            std::thread::sleep(std::time::Duration::from_millis(50));
            // a load arms alignment while it still holds the tree
            state.arm_alignment();
            drop(global);
            assert!(pending.join().unwrap().is_none());
        });
        assert!(state.lock_global().is_empty());
    }

    #[test]
    fn test_drop_while_landing() {
        let (state, handler) = setup(&ServerConfig::default());
        let mut robot = RobotState::at(Point3::ZERO);
        robot.diagnostics = Some(VehicleDiagnostics {
            flight_state: FlightState::Landing,
        });
        state.set_robot(robot);
        assert!(handler.handle(&wall_measurement()).is_none());

        robot.diagnostics = Some(VehicleDiagnostics {
            flight_state: FlightState::Flying,
        });
        state.set_robot(robot);
        assert!(handler.handle(&wall_measurement()).is_some());
    }

    #[test]
    fn test_keep_only_nearby() {
        let mut config = ServerConfig::default();
        config.global_map.keep_only_nearby = true;
        config.global_map.nearby_distance = 1.0;
        let (state, handler) = setup(&config);

        // first insert far from the second origin
        handler.handle(&Measurement::new(
            Point3::new(10.05, 0.05, 0.55),
            vec![Point3::new(10.55, 0.05, 0.55)],
        ));
        assert!(state.lock_global().search(Point3::new(10.55, 0.05, 0.55)).is_some());

        handler.handle(&wall_measurement());
        let global = state.lock_global();
        assert!(global.search(Point3::new(10.55, 0.05, 0.55)).is_none());
        assert!(global.search(Point3::new(0.55, 0.05, 0.55)).is_some());
        // the wall is 2 m away, outside the kept cube
        assert!(global.search(Point3::new(2.05, 0.05, 0.55)).is_none());
    }

    #[test]
    fn test_nearby_clearing() {
        let mut config = ServerConfig::default();
        config.global_map.nearby_clearing = true;
        config.global_map.clearing_distance = 0.3;
        let (state, handler) = setup(&config);

        let origin = Point3::new(0.05, 0.05, 0.55);
        handler.handle(&Measurement::new(origin, vec![Point3::new(0.25, 0.05, 0.55)]));
        let global = state.lock_global();
        let node = global.search(Point3::new(0.25, 0.05, 0.55)).unwrap();
        assert!(!node.is_occupied());
    }
}
