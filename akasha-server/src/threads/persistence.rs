//! Persistence thread: periodic snapshots of the global map to disk.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick};

use crate::persistence::MapStore;
use crate::shared::SharedMapState;

/// Persistence thread state and logic.
pub struct PersistenceThread {
    state: Arc<SharedMapState>,
    store: MapStore,
    period: Duration,
}

impl PersistenceThread {
    pub fn new(state: Arc<SharedMapState>, store: MapStore, period: Duration) -> Self {
        Self {
            state,
            store,
            period,
        }
    }

    pub fn run(&mut self) {
        tracing::info!(
            "Persistence thread started: saving to {:?} every {:.0} s",
            self.store.path(),
            self.period.as_secs_f64()
        );
        let ticker = tick(self.period);

        while !self.state.should_shutdown() {
            select! {
                recv(ticker) -> _ => self.save(),
                default(Duration::from_millis(100)) => {}
            }
        }
        tracing::info!("Persistence thread shutting down");
    }

    fn save(&self) {
        // A pending alignment means the loaded map is not yet in this frame.
        if self.state.is_alignment_pending() {
            tracing::debug!("Alignment pending, skipping periodic save");
            return;
        }
        let global = self.state.lock_global();
        if global.is_empty() {
            return;
        }
        if let Err(e) = self.store.save(&global) {
            tracing::error!("Periodic map save failed: {}", e);
        }
    }
}
