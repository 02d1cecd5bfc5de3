//! Local map scheduling.
//!
//! Every period the local tree is rebuilt as a copy of the global tree
//! inside a box around the robot. The box extent adapts to how long the
//! previous build took:
//!
//! ```text
//! duty factor = last build / (period * max duty cycle)
//!
//!   >= 1.0  shrink extents by one step (never below the minimum)
//!   <= 0.5  grow extents by one step (never above the nominal)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use akasha_map::{Bounds3, region};
use tracing::{debug, trace, warn};

use crate::config::LocalMapConfig;
use crate::publisher::{MapKind, MapPublisher, publish_tree};
use crate::shared::SharedMapState;

/// Duty factor at or above which the extent shrinks.
pub const SHRINK_FACTOR: f64 = 1.0;

/// Duty factor at or below which the extent grows back.
pub const GROW_FACTOR: f64 = 0.5;

/// Adapts the local window extent to the measured build time.
///
/// Offsets are non-positive and applied to the nominal half extents.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtentController {
    nominal_horizontal: f64,
    nominal_vertical: f64,
    min_horizontal: f64,
    min_vertical: f64,
    step: f64,
    period: Duration,
    max_duty_cycle: f64,
    horizontal_offset: f64,
    vertical_offset: f64,
}

impl ExtentController {
    /// Create a controller at nominal extent.
    pub fn new(config: &LocalMapConfig) -> Self {
        Self {
            nominal_horizontal: config.horizontal_distance,
            nominal_vertical: config.vertical_distance,
            min_horizontal: config.min_horizontal_distance.min(config.horizontal_distance),
            min_vertical: config.min_vertical_distance.min(config.vertical_distance),
            step: config.extent_step.abs(),
            period: Duration::from_secs_f64(1.0 / config.rate_hz),
            max_duty_cycle: config.max_duty_cycle,
            horizontal_offset: 0.0,
            vertical_offset: 0.0,
        }
    }

    /// Build period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current offsets (horizontal, vertical).
    pub fn offsets(&self) -> (f64, f64) {
        (self.horizontal_offset, self.vertical_offset)
    }

    /// Current half extents (horizontal, vertical).
    pub fn extent(&self) -> (f64, f64) {
        (
            self.nominal_horizontal + self.horizontal_offset,
            self.nominal_vertical + self.vertical_offset,
        )
    }

    /// Ratio of the last build time to the allowed build time.
    pub fn duty_factor(&self, last_build: Duration) -> f64 {
        let budget = self.period.as_secs_f64() * self.max_duty_cycle;
        if budget <= 0.0 {
            return f64::INFINITY;
        }
        last_build.as_secs_f64() / budget
    }

    /// Update offsets from the last build duration. Returns the duty factor.
    pub fn adjust(&mut self, last_build: Duration) -> f64 {
        let factor = self.duty_factor(last_build);

        if factor >= SHRINK_FACTOR {
            let mut clamped = false;
            self.horizontal_offset -= self.step;
            if self.nominal_horizontal + self.horizontal_offset < self.min_horizontal {
                self.horizontal_offset = self.min_horizontal - self.nominal_horizontal;
                clamped = true;
            }
            self.vertical_offset -= self.step;
            if self.nominal_vertical + self.vertical_offset < self.min_vertical {
                self.vertical_offset = self.min_vertical - self.nominal_vertical;
                clamped = true;
            }
            if clamped {
                warn!(
                    "Local map build takes {:.0}% of its budget, extent clamped at minimum {:.2} x {:.2} m",
                    factor * 100.0,
                    self.min_horizontal,
                    self.min_vertical
                );
            } else {
                debug!(
                    "Local map extent shrunk to {:.2} x {:.2} m (duty factor {:.2})",
                    self.nominal_horizontal + self.horizontal_offset,
                    self.nominal_vertical + self.vertical_offset,
                    factor
                );
            }
        } else if factor <= GROW_FACTOR {
            self.horizontal_offset = (self.horizontal_offset + self.step).min(0.0);
            self.vertical_offset = (self.vertical_offset + self.step).min(0.0);
        }

        factor
    }
}

/// Phase of the local map cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LocalMapPhase {
    #[default]
    Idle,
    Building,
    Published,
}

/// Rebuilds and publishes the local map.
pub struct LocalMapScheduler {
    state: Arc<SharedMapState>,
    controller: ExtentController,
    publisher: Option<Arc<dyn MapPublisher>>,
    phase: LocalMapPhase,
}

impl LocalMapScheduler {
    pub fn new(
        config: &LocalMapConfig,
        state: Arc<SharedMapState>,
        publisher: Option<Arc<dyn MapPublisher>>,
    ) -> Self {
        Self {
            state,
            controller: ExtentController::new(config),
            publisher,
            phase: LocalMapPhase::Idle,
        }
    }

    pub fn controller(&self) -> &ExtentController {
        &self.controller
    }

    pub fn phase(&self) -> LocalMapPhase {
        self.phase
    }

    /// Run one build cycle.
    ///
    /// Returns the number of voxels copied, or `None` if no robot position
    /// is known yet.
    pub fn run_once(&mut self) -> Option<usize> {
        let Some(robot) = self.state.robot() else {
            trace!("No robot position yet, skipping local map");
            self.phase = LocalMapPhase::Idle;
            return None;
        };

        self.phase = LocalMapPhase::Building;
        self.controller.adjust(self.state.last_build_duration());
        let (horizontal, vertical) = self.controller.extent();
        let bounds = Bounds3::around(robot.position, horizontal, vertical);

        let start = Instant::now();
        let copied = {
            let (mut global, mut local) = self.state.lock_both();
            local.clear();
            region::copy_into(&mut global, &mut local, &bounds)
        };
        let elapsed = start.elapsed();
        self.state.set_last_build_duration(elapsed);

        trace!(
            "Local map built in {:.1} ms: {} voxels within {:.2} x {:.2} m",
            elapsed.as_secs_f64() * 1000.0,
            copied,
            horizontal,
            vertical
        );

        if let Some(publisher) = &self.publisher {
            let local = self.state.lock_local();
            publish_tree(publisher.as_ref(), MapKind::Local, &local);
        }
        self.phase = LocalMapPhase::Published;
        Some(copied)
    }
}
