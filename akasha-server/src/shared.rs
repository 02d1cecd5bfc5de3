//! Shared state for multi-threaded architecture.
//!
//! Provides thread-safe shared state between:
//! - Ingest thread (measurement classification and global map updates)
//! - Global map thread (periodic compression and publication)
//! - Local map thread (bounded window extraction)
//! - Persistence and alignment threads
//!
//! Lock order: whenever both trees are held, global is locked first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use akasha_map::{KeyBounds, OccupancyOctree};
use parking_lot::{Mutex, MutexGuard};

use crate::diagnostics::{RobotState, VehicleDiagnostics};

/// Shared state between all threads.
#[derive(Debug)]
pub struct SharedMapState {
    /// Full-resolution map fused from every measurement
    global: Mutex<OccupancyOctree>,

    /// Bounded window around the robot, rebuilt periodically
    local: Mutex<OccupancyOctree>,

    /// Key extent touched since the last reset or load
    update_bounds: Mutex<Option<KeyBounds>>,

    /// Duration of the most recent local map build
    last_build: Mutex<Duration>,

    /// Latest robot pose and diagnostics
    robot: Mutex<Option<RobotState>>,

    /// Gate for measurement integration
    initialized: AtomicBool,

    /// A loaded map waits for ground alignment
    alignment_pending: AtomicBool,

    /// Shutdown signal for graceful termination
    shutdown: AtomicBool,
}

impl SharedMapState {
    /// Create shared state around two trees. Integration starts enabled.
    pub fn new(global: OccupancyOctree, local: OccupancyOctree) -> Self {
        Self {
            global: Mutex::new(global),
            local: Mutex::new(local),
            update_bounds: Mutex::new(None),
            last_build: Mutex::new(Duration::ZERO),
            robot: Mutex::new(None),
            initialized: AtomicBool::new(true),
            alignment_pending: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Lock the global tree.
    pub fn lock_global(&self) -> MutexGuard<'_, OccupancyOctree> {
        self.global.lock()
    }

    /// Lock the local tree. Never call while holding it and then lock global.
    pub fn lock_local(&self) -> MutexGuard<'_, OccupancyOctree> {
        self.local.lock()
    }

    /// Lock both trees, global first.
    pub fn lock_both(
        &self,
    ) -> (
        MutexGuard<'_, OccupancyOctree>,
        MutexGuard<'_, OccupancyOctree>,
    ) {
        let global = self.global.lock();
        let local = self.local.lock();
        (global, local)
    }

    /// Check if measurements are integrated.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Open or close the integration gate.
    pub fn set_initialized(&self, value: bool) {
        self.initialized.store(value, Ordering::Release);
    }

    /// Check if a ground alignment is pending.
    pub fn is_alignment_pending(&self) -> bool {
        self.alignment_pending.load(Ordering::Acquire)
    }

    /// Request a ground alignment; integration is closed until it completes.
    pub fn arm_alignment(&self) {
        self.set_initialized(false);
        self.alignment_pending.store(true, Ordering::Release);
    }

    /// Mark the pending alignment done and open integration.
    pub fn finish_alignment(&self) {
        self.alignment_pending.store(false, Ordering::Release);
        self.set_initialized(true);
    }

    /// Signal shutdown.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Check if shutdown is signaled.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Duration of the most recent local map build.
    pub fn last_build_duration(&self) -> Duration {
        *self.last_build.lock()
    }

    /// Record a local map build duration.
    pub fn set_last_build_duration(&self, duration: Duration) {
        *self.last_build.lock() = duration;
    }

    /// Latest robot state.
    pub fn robot(&self) -> Option<RobotState> {
        *self.robot.lock()
    }

    /// Replace the robot state.
    pub fn set_robot(&self, state: RobotState) {
        *self.robot.lock() = Some(state);
    }

    /// Latest diagnostics, if any.
    pub fn diagnostics(&self) -> Option<VehicleDiagnostics> {
        self.robot.lock().and_then(|r| r.diagnostics)
    }

    /// Key extent touched since the last reset.
    pub fn update_bounds(&self) -> Option<KeyBounds> {
        *self.update_bounds.lock()
    }

    /// Grow the update extent.
    pub fn expand_update_bounds(&self, bounds: KeyBounds) {
        let mut guard = self.update_bounds.lock();
        *guard = Some(match *guard {
            Some(current) => current.union(&bounds),
            None => bounds,
        });
    }

    /// Replace the update extent.
    pub fn reset_update_bounds(&self, bounds: Option<KeyBounds>) {
        *self.update_bounds.lock() = bounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akasha_map::VoxelKey;

    fn state() -> SharedMapState {
        let tree = OccupancyOctree::with_resolution(0.1);
        SharedMapState::new(tree.clone(), tree)
    }

    #[test]
    fn test_alignment_flags() {
        let state = state();
        assert!(state.is_initialized());
        assert!(!state.is_alignment_pending());

        state.arm_alignment();
        assert!(!state.is_initialized());
        assert!(state.is_alignment_pending());

        state.finish_alignment();
        assert!(state.is_initialized());
        assert!(!state.is_alignment_pending());
    }

    #[test]
    fn test_update_bounds_accumulate() {
        let state = state();
        assert!(state.update_bounds().is_none());
        state.expand_update_bounds(KeyBounds::from_key(VoxelKey::new(10, 10, 10)));
        state.expand_update_bounds(KeyBounds::from_key(VoxelKey::new(5, 20, 10)));
        let bounds = state.update_bounds().unwrap();
        assert_eq!(bounds.min, VoxelKey::new(5, 10, 10));
        assert_eq!(bounds.max, VoxelKey::new(10, 20, 10));

        state.reset_update_bounds(None);
        assert!(state.update_bounds().is_none());
    }

    #[test]
    fn test_lock_both() {
        let state = state();
        {
            let (mut global, local) = state.lock_both();
            global.update_coord(akasha_map::Point3::ZERO, true);
            assert!(local.is_empty());
        }
        assert!(!state.lock_global().is_empty());
    }
}
