//! Map files on disk.
//!
//! Maps live at `<directory>/<name>.<ext>`, the extension selecting the
//! format. Saves are atomic and keep the previous file as `.bak`.

use std::fs;
use std::path::{Path, PathBuf};

use akasha_map::io::{self, canonical_path};
use akasha_map::{LoadedMap, MapFormat, OccupancyOctree};
use tracing::debug;

use crate::config::PersistenceConfig;
use crate::error::Result;

/// Named map storage in one directory.
#[derive(Clone, Debug)]
pub struct MapStore {
    directory: PathBuf,
    name: String,
    format: MapFormat,
}

impl MapStore {
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>, format: MapFormat) -> Self {
        Self {
            directory: directory.into(),
            name: name.into(),
            format,
        }
    }

    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::new(&config.directory, &config.map_name, config.format)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn format(&self) -> MapFormat {
        self.format
    }

    /// Canonical path of the default map.
    pub fn path(&self) -> PathBuf {
        self.path_for(&self.name)
    }

    /// Canonical path of a named map in the store's format.
    pub fn path_for(&self, name: &str) -> PathBuf {
        canonical_path(&self.directory, name, self.format)
    }

    /// Save the default map.
    pub fn save(&self, tree: &OccupancyOctree) -> Result<PathBuf> {
        self.save_as(tree, &self.name)
    }

    /// Save under another name.
    pub fn save_as(&self, tree: &OccupancyOctree, name: &str) -> Result<PathBuf> {
        if !self.directory.exists() {
            debug!("Creating map directory {:?}", self.directory);
            fs::create_dir_all(&self.directory)?;
        }
        let path = self.path_for(name);
        io::save_atomic(tree, &path)?;
        Ok(path)
    }

    /// Load the default map.
    pub fn load(&self) -> Result<LoadedMap> {
        self.load_from(&self.name)
    }

    /// Load a named map.
    pub fn load_from(&self, name: &str) -> Result<LoadedMap> {
        Ok(io::load_map(&self.path_for(name))?)
    }
}
