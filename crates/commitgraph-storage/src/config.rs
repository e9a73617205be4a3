//! Configuration for opening commit-graph files

use crate::{COMMIT_GRAPH_PATH, Result, StorageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for opening a commit-graph file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Path of the commit-graph file
    pub path: PathBuf,

    /// Memory-map the file instead of reading it into memory
    pub use_mmap: bool,

    /// Largest file accepted (in bytes)
    pub max_file_size: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("objects").join(COMMIT_GRAPH_PATH),
            use_mmap: true,
            max_file_size: 4 * 1024 * 1024 * 1024, // 4 GiB
        }
    }
}

impl GraphConfig {
    /// Create a configuration for the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Create a configuration for the commit-graph of an objects directory
    pub fn for_objects_dir<P: AsRef<Path>>(objects_dir: P) -> Self {
        Self::new(objects_dir.as_ref().join(COMMIT_GRAPH_PATH))
    }

    /// Set the file path
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Enable or disable memory mapping
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.use_mmap = enable;
        self
    }

    /// Set the largest accepted file size
    #[must_use]
    pub const fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Load a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialise to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| StorageError::Config(e.to_string()))
    }
}
