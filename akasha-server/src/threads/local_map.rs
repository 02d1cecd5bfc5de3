//! Local map thread: bounded window rebuilds around the robot.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick};

use crate::scheduler::LocalMapScheduler;
use crate::shared::SharedMapState;

/// Local map thread state and logic.
pub struct LocalMapThread {
    state: Arc<SharedMapState>,
    scheduler: LocalMapScheduler,
}

impl LocalMapThread {
    pub fn new(state: Arc<SharedMapState>, scheduler: LocalMapScheduler) -> Self {
        Self { state, scheduler }
    }

    pub fn run(&mut self) {
        let period = self.scheduler.controller().period();
        tracing::info!("Local map thread started ({:.1} Hz)", 1.0 / period.as_secs_f64());
        let ticker = tick(period);

        while !self.state.should_shutdown() {
            select! {
                recv(ticker) -> _ => {
                    self.scheduler.run_once();
                }
                default(Duration::from_millis(100)) => {}
            }
        }
        tracing::info!("Local map thread shutting down");
    }
}
