//! Map persistence and export.
//!
//! This module provides save/load functionality:
//!
//! - **Full .ot format**: complete tree structure with log-odds values
//! - **Binary .bt format**: maximum-likelihood occupancy, two bits per child
//! - **Atomic persistence**: temp file + rename with a `.bak` of the previous map
//! - **Snapshots**: leaf-sequence export for publication
//!
//! ## Saving and Loading Maps
//!
//! ```rust,ignore
//! use akasha_map::io::{canonical_path, load_map, save_atomic, MapFormat};
//! use std::path::Path;
//!
//! let path = canonical_path(Path::new("/var/lib/akasha"), "office", MapFormat::Full);
//! save_atomic(&tree, &path)?;
//!
//! let loaded = load_map(&path)?;
//! println!("{} leaves", loaded.metadata.leaf_count);
//! ```

mod binary_format;
mod full_format;
mod header;
mod persist;
mod snapshot;

pub use binary_format::{load_binary, read_binary, save_binary, write_binary};
pub use full_format::{load_full, read_full, save_full, write_full};
pub use persist::{
    LoadedMap, MapFormat, MapMetadata, backup_path, canonical_path, load_map, save_atomic,
    save_map, temp_path,
};
pub use snapshot::{
    LeafRecord, MapSnapshot, from_binary_bytes, from_full_bytes, to_binary_bytes, to_full_bytes,
};
