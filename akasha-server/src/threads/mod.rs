//! Multi-threaded architecture for AkashaServer.
//!
//! One thread per responsibility:
//! - Ingest thread: measurement classification and global map updates
//! - Global map thread: periodic compression and publication
//! - Local map thread: window rebuilds around the robot (optional)
//! - Persistence thread: periodic saves (optional)
//! - Alignment thread: ground alignment after a map load (optional)
//!
//! All threads poll the shared shutdown flag at least every 100 ms.

mod alignment;
mod global_map;
mod ingest;
mod local_map;
mod persistence;

pub use alignment::AlignmentThread;
pub use global_map::GlobalMapThread;
pub use ingest::IngestThread;
pub use local_map::LocalMapThread;
pub use persistence::PersistenceThread;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::error::{Result, ServerError};
use crate::ingest::Measurement;
use crate::publisher::MapPublisher;
use crate::scheduler::LocalMapScheduler;
use crate::server::MapServer;

/// Thread handles for the multi-threaded system.
pub struct ThreadHandles {
    pub ingest: JoinHandle<()>,
    pub global_map: JoinHandle<()>,
    pub local_map: Option<JoinHandle<()>>,
    pub persistence: Option<JoinHandle<()>>,
    pub alignment: Option<JoinHandle<()>>,
}

impl ThreadHandles {
    /// True if any spawned thread has exited.
    pub fn any_finished(&self) -> bool {
        self.ingest.is_finished()
            || self.global_map.is_finished()
            || [&self.local_map, &self.persistence, &self.alignment]
                .into_iter()
                .flatten()
                .any(|h| h.is_finished())
    }

    /// Join every thread, logging panics.
    pub fn join(self) {
        let handles = [
            ("ingest", Some(self.ingest)),
            ("global map", Some(self.global_map)),
            ("local map", self.local_map),
            ("persistence", self.persistence),
            ("alignment", self.alignment),
        ];
        for (name, handle) in handles {
            if let Some(handle) = handle
                && let Err(e) = handle.join()
            {
                tracing::error!("{} thread panicked: {:?}", name, e);
            }
        }
    }
}

fn spawn<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(body)
        .map_err(|e| ServerError::Thread(format!("Failed to spawn {} thread: {}", name, e)))
}

/// Spawn all threads and return handles.
pub fn spawn_threads(
    server: &MapServer,
    measurements: Receiver<Measurement>,
    publisher: Option<Arc<dyn MapPublisher>>,
) -> Result<ThreadHandles> {
    let config = server.config();

    let state = Arc::clone(server.state());
    let handler = server.handler().clone();
    let ingest = spawn("ingest", move || {
        IngestThread::new(state, handler, measurements).run();
    })?;

    let state = Arc::clone(server.state());
    let global_publisher = publisher.clone();
    let rate = config.global_map.publish_rate_hz;
    let compress = config.map.compress;
    let global_map = spawn("global-map", move || {
        GlobalMapThread::new(state, global_publisher, rate, compress).run();
    })?;

    let local_map = if config.local_map.enabled {
        let state = Arc::clone(server.state());
        let scheduler = LocalMapScheduler::new(&config.local_map, Arc::clone(&state), publisher);
        Some(spawn("local-map", move || {
            LocalMapThread::new(state, scheduler).run();
        })?)
    } else {
        None
    };

    let persistence = if config.persistence.enabled {
        let state = Arc::clone(server.state());
        let store = server.store().clone();
        let period = Duration::from_secs_f64(config.persistence.period_secs);
        Some(spawn("persistence", move || {
            PersistenceThread::new(state, store, period).run();
        })?)
    } else {
        None
    };

    let alignment = if config.alignment.enabled {
        let state = Arc::clone(server.state());
        let aligner = server.aligner().clone();
        Some(spawn("alignment", move || {
            AlignmentThread::new(state, aligner).run();
        })?)
    } else {
        None
    };

    Ok(ThreadHandles {
        ingest,
        global_map,
        local_map,
        persistence,
        alignment,
    })
}
