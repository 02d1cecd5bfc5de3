//! Crash-safe map persistence.
//!
//! Save sequence for a canonical path `<dir>/<name>.<ext>`:
//!
//! ```text
//!   1. write   <name>.<ext>.tmp            (failure: save fails)
//!   2. rename  <name>.<ext> -> .bak        (failure: logged, save continues)
//!   3. rename  <name>.<ext>.tmp -> <name>.<ext>   (failure: save fails)
//! ```
//!
//! At every point either the previous or the new file is complete on disk.
//! The format is chosen by extension: `.ot` (full) or `.bt` (binary).
//! Anything else is rejected rather than silently switching formats.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::binary_format::{load_binary, save_binary};
use super::full_format::{load_full, save_full};
use crate::core::Bounds3;
use crate::error::{MapIoError, Result};
use crate::octree::{KeyBounds, OccupancyOctree};

/// On-disk map format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapFormat {
    /// `.ot`: full structure and values
    Full,
    /// `.bt`: occupancy bits only
    Binary,
}

impl MapFormat {
    /// Select the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ot") => Ok(MapFormat::Full),
            Some("bt") => Ok(MapFormat::Binary),
            other => Err(MapIoError::UnsupportedExtension(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MapFormat::Full => "ot",
            MapFormat::Binary => "bt",
        }
    }
}

/// Canonical path `<dir>/<name>.<ext>`.
pub fn canonical_path(dir: &Path, name: &str, format: MapFormat) -> PathBuf {
    dir.join(format!("{}.{}", name, format.extension()))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Temporary path written before the atomic rename.
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

/// Backup path holding the previous canonical file.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

/// Write `tree` to `path` in the format implied by its extension.
pub fn save_map(tree: &OccupancyOctree, path: &Path) -> Result<()> {
    match MapFormat::from_path(path)? {
        MapFormat::Full => save_full(tree, path),
        MapFormat::Binary => save_binary(tree, path),
    }
}

/// Save `tree` to its canonical path with temp-file + rename semantics.
pub fn save_atomic(tree: &OccupancyOctree, path: &Path) -> Result<()> {
    let format = MapFormat::from_path(path)?;
    let tmp = temp_path(path);

    let written = match format {
        MapFormat::Full => save_full(tree, &tmp),
        MapFormat::Binary => save_binary(tree, &tmp),
    };
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    if path.exists() {
        let backup = backup_path(path);
        if let Err(e) = std::fs::rename(path, &backup) {
            warn!("Could not back up {:?} to {:?}: {}", path, backup, e);
        }
    }

    std::fs::rename(&tmp, path)?;
    info!(
        "Saved map to {:?} ({} nodes, {:?})",
        path,
        tree.size(),
        format
    );
    Ok(())
}

/// Derived metadata of a loaded tree.
#[derive(Clone, Debug, PartialEq)]
pub struct MapMetadata {
    /// Finest voxel size
    pub resolution: f64,
    /// Tree depth
    pub max_depth: u8,
    /// Metric extent of known space
    pub bounds: Option<Bounds3>,
    /// Key extent of known space, used as the initial update box
    pub update_bounds: Option<KeyBounds>,
    /// Number of leaves
    pub leaf_count: usize,
}

impl MapMetadata {
    /// Compute metadata from a tree.
    pub fn from_tree(tree: &OccupancyOctree) -> Self {
        let bounds = tree.metric_bounds();
        let update_bounds = bounds.and_then(|b| tree.codec().bounds_to_keys(&b));
        Self {
            resolution: tree.resolution(),
            max_depth: tree.max_depth(),
            bounds,
            update_bounds,
            leaf_count: tree.leaf_count(),
        }
    }
}

/// A tree read from disk with its recomputed metadata.
#[derive(Clone, Debug)]
pub struct LoadedMap {
    /// The loaded tree
    pub tree: OccupancyOctree,
    /// Metadata derived from `tree`
    pub metadata: MapMetadata,
}

/// Read a tree from `path`; the format follows the extension.
///
/// The caller owns replacement of its active tree, so a failed load leaves
/// existing state untouched.
pub fn load_map(path: &Path) -> Result<LoadedMap> {
    let tree = match MapFormat::from_path(path)? {
        MapFormat::Full => load_full(path)?,
        MapFormat::Binary => load_binary(path)?,
    };
    let metadata = MapMetadata::from_tree(&tree);
    info!(
        "Loaded map from {:?}: resolution {:.3} m, depth {}, {} leaves",
        path, metadata.resolution, metadata.max_depth, metadata.leaf_count
    );
    Ok(LoadedMap { tree, metadata })
}
