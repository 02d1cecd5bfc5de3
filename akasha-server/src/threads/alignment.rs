//! Alignment thread: runs the ground alignment whenever one is armed.

use std::sync::Arc;
use std::time::Duration;

use crate::alignment::{AlignmentOutcome, GroundAligner};
use crate::shared::SharedMapState;

/// Alignment thread state and logic.
pub struct AlignmentThread {
    state: Arc<SharedMapState>,
    aligner: GroundAligner,
    poll_interval: Duration,
}

impl AlignmentThread {
    pub fn new(state: Arc<SharedMapState>, aligner: GroundAligner) -> Self {
        Self {
            state,
            aligner,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn run(&mut self) {
        tracing::info!("Alignment thread started");

        while !self.state.should_shutdown() {
            match self.aligner.run_pending(&self.state) {
                Some(AlignmentOutcome::Translated(offset)) => {
                    tracing::info!("Map aligned to ground ({:+.3} m)", offset);
                }
                Some(AlignmentOutcome::Abandoned) => {
                    tracing::warn!("Ground alignment abandoned, mapping from scratch");
                }
                None => {}
            }
            std::thread::sleep(self.poll_interval);
        }
        tracing::info!("Alignment thread shutting down");
    }
}
