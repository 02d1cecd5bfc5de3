//! # AkashaServer
//!
//! Octree mapping server built on [`akasha_map`].
//!
//! The server keeps two maps:
//!
//! - **Global map**: every accepted measurement fused at full resolution
//! - **Local map**: a bounded copy of the global map around the robot,
//!   rebuilt periodically with an extent adapted to the build time
//!
//! Around them it provides measurement gating on flight state, periodic
//! publication, atomic persistence with backups, and vertical alignment of
//! loaded maps to the current ground.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use akasha_server::{MapServer, Measurement, ServerConfig};
//!
//! let server = MapServer::new(ServerConfig::default())?;
//! let stats = server.insert(&Measurement::new(origin, points));
//! server.save_as("office")?;
//! ```

pub mod alignment;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod persistence;
pub mod publisher;
pub mod scheduler;
pub mod server;
pub mod shared;
pub mod threads;

pub use alignment::{AlignmentOutcome, GroundAligner};
pub use config::ServerConfig;
pub use diagnostics::{FlightState, RobotState, VehicleDiagnostics, may_integrate};
pub use error::{Result, ServerError};
pub use ingest::{Measurement, MeasurementHandler};
pub use persistence::MapStore;
pub use publisher::{ChannelPublisher, MapKind, MapPublisher, PublishedMap};
pub use scheduler::{ExtentController, LocalMapPhase, LocalMapScheduler};
pub use server::MapServer;
pub use shared::SharedMapState;
