//! Global map thread: periodic compression and publication.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{select, tick};

use crate::publisher::{MapKind, MapPublisher, publish_tree};
use crate::shared::SharedMapState;

/// Global map thread state and logic.
pub struct GlobalMapThread {
    state: Arc<SharedMapState>,
    publisher: Option<Arc<dyn MapPublisher>>,
    period: Duration,
    compress: bool,
}

impl GlobalMapThread {
    pub fn new(
        state: Arc<SharedMapState>,
        publisher: Option<Arc<dyn MapPublisher>>,
        rate_hz: f64,
        compress: bool,
    ) -> Self {
        Self {
            state,
            publisher,
            period: Duration::from_secs_f64(1.0 / rate_hz),
            compress,
        }
    }

    pub fn run(&mut self) {
        tracing::info!(
            "Global map thread started ({:.1} Hz)",
            1.0 / self.period.as_secs_f64()
        );
        let ticker = tick(self.period);

        while !self.state.should_shutdown() {
            select! {
                recv(ticker) -> _ => self.cycle(),
                default(Duration::from_millis(100)) => {}
            }
        }
        tracing::info!("Global map thread shutting down");
    }

    fn cycle(&self) {
        let mut global = self.state.lock_global();
        if self.compress {
            let pruned = global.prune();
            if pruned > 0 {
                tracing::debug!("Global map compressed, {} nodes pruned", pruned);
            }
        }
        if let Some(publisher) = &self.publisher {
            publish_tree(publisher.as_ref(), MapKind::Global, &global);
        }
    }
}
