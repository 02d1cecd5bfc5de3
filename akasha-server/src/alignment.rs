//! Vertical alignment of a loaded map to the current ground.
//!
//! After a map is loaded its frame may not agree with the robot's odometry
//! frame in height. The aligner finds the ground under the robot and shifts
//! the whole map so that it sits where the robot expects it.

use akasha_map::{OccupancyOctree, Point3, region};
use tracing::{info, warn};

use crate::config::AlignmentConfig;
use crate::diagnostics::RobotState;
use crate::shared::SharedMapState;

/// Result of an alignment attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlignmentOutcome {
    /// Map shifted vertically by the given offset.
    Translated(f64),
    /// Ground could not be established; the map was cleared.
    Abandoned,
}

/// One-shot ground aligner.
#[derive(Clone, Debug)]
pub struct GroundAligner {
    search_radius: f64,
    robot_height: f64,
}

impl GroundAligner {
    pub fn new(config: &AlignmentConfig) -> Self {
        Self {
            search_radius: config.ground_detection_radius,
            robot_height: config.robot_height,
        }
    }

    /// Expected ground height below the robot.
    ///
    /// Uses the measured height when available. Without one, the configured
    /// robot height is only trusted on the ground.
    pub fn expected_ground(&self, robot: &RobotState) -> Option<f64> {
        match robot.height {
            Some(height) => Some(robot.position.z - height),
            None if robot.is_airborne() => None,
            None => Some(robot.position.z - self.robot_height),
        }
    }

    /// Align `tree` in place.
    pub fn align(&self, tree: &mut OccupancyOctree, robot: &RobotState) -> AlignmentOutcome {
        let Some(expected) = self.expected_ground(robot) else {
            warn!("Robot is airborne without a height measurement, clearing map");
            tree.clear();
            return AlignmentOutcome::Abandoned;
        };

        let position = robot.position;
        let Some(ground) = region::ground_z(tree, position.x, position.y, self.search_radius)
        else {
            warn!(
                "No ground found under ({:.2}, {:.2}) in the loaded map, clearing map",
                position.x, position.y
            );
            tree.clear();
            return AlignmentOutcome::Abandoned;
        };

        let offset = expected - ground;
        info!(
            "Aligning map: ground at {:.3} m, expected {:.3} m, shifting by {:.3} m",
            ground, expected, offset
        );
        *tree = region::translate(tree, Point3::new(0.0, 0.0, offset));
        AlignmentOutcome::Translated(offset)
    }

    /// Run a pending alignment against the shared global tree.
    ///
    /// Returns `None` if nothing is pending or no robot state is known yet.
    /// On completion the pending flag is cleared and integration resumes,
    /// whatever the outcome.
    pub fn run_pending(&self, state: &SharedMapState) -> Option<AlignmentOutcome> {
        if !state.is_alignment_pending() {
            return None;
        }
        let robot = state.robot()?;

        let outcome = {
            let mut global = state.lock_global();
            let outcome = self.align(&mut global, &robot);
            if outcome == AlignmentOutcome::Abandoned {
                state.reset_update_bounds(None);
            }
            outcome
        };
        state.finish_alignment();
        Some(outcome)
    }
}
