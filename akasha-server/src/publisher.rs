//! Map publication.
//!
//! Global and local trees are exported as leaf snapshots and handed to a
//! [`MapPublisher`]. The server ships a channel-backed publisher; transports
//! live behind the trait.

use akasha_map::{MapSnapshot, OccupancyOctree};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, warn};

/// Which map a publication carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKind {
    Global,
    Local,
}

/// A published map.
#[derive(Clone, Debug)]
pub struct PublishedMap {
    pub kind: MapKind,
    pub snapshot: MapSnapshot,
}

/// Sink for published maps.
pub trait MapPublisher: Send + Sync {
    /// Deliver one map. Returns false if it was discarded.
    fn publish(&self, map: PublishedMap) -> bool;
}

/// Export `tree` and publish it, skipping trees with no content.
///
/// Returns true if the map was handed to the publisher.
pub fn publish_tree(publisher: &dyn MapPublisher, kind: MapKind, tree: &OccupancyOctree) -> bool {
    if tree.size() <= 1 {
        warn!("Nothing to publish, {:?} map is empty", kind);
        return false;
    }
    let snapshot = MapSnapshot::from_tree(tree);
    debug!("Publishing {:?} map with {} leaves", kind, snapshot.len());
    publisher.publish(PublishedMap { kind, snapshot })
}

/// Publisher backed by a bounded crossbeam channel.
///
/// Publication never blocks: if the consumer falls behind, new maps are
/// dropped.
#[derive(Clone, Debug)]
pub struct ChannelPublisher {
    tx: Sender<PublishedMap>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, Receiver<PublishedMap>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl MapPublisher for ChannelPublisher {
    fn publish(&self, map: PublishedMap) -> bool {
        match self.tx.try_send(map) {
            Ok(()) => true,
            Err(TrySendError::Full(map)) => {
                debug!("Map consumer is behind, dropping {:?} map", map.kind);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
