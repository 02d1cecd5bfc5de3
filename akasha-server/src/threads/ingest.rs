//! Ingest thread: measurement integration.
//!
//! Receives measurements from the sensor channel and fuses them into the
//! global map through the [`MeasurementHandler`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::ingest::{Measurement, MeasurementHandler};
use crate::shared::SharedMapState;

/// Ingest thread state and logic.
pub struct IngestThread {
    state: Arc<SharedMapState>,
    handler: MeasurementHandler,
    measurements: Receiver<Measurement>,
    integrated: u64,
    dropped: u64,
    last_status: Instant,
    status_interval: Duration,
}

impl IngestThread {
    pub fn new(
        state: Arc<SharedMapState>,
        handler: MeasurementHandler,
        measurements: Receiver<Measurement>,
    ) -> Self {
        Self {
            state,
            handler,
            measurements,
            integrated: 0,
            dropped: 0,
            last_status: Instant::now(),
            status_interval: Duration::from_secs(10),
        }
    }

    /// Run the ingest loop until shutdown or channel disconnect.
    pub fn run(&mut self) {
        tracing::info!("Ingest thread started");

        loop {
            if self.state.should_shutdown() {
                tracing::info!("Ingest thread shutting down");
                break;
            }

            match self.measurements.recv_timeout(Duration::from_millis(100)) {
                Ok(measurement) => match self.handler.handle(&measurement) {
                    Some(_) => self.integrated += 1,
                    None => self.dropped += 1,
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("Measurement channel disconnected, ingest thread exiting");
                    break;
                }
            }

            if self.last_status.elapsed() >= self.status_interval {
                tracing::info!(
                    "Ingest: {} measurements integrated, {} dropped",
                    self.integrated,
                    self.dropped
                );
                self.last_status = Instant::now();
            }
        }
    }
}
