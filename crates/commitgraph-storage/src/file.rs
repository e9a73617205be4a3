//! An opened commit-graph file
//!
//! Opening stats the file, maps (or reads) it and validates it completely.
//! The resulting [`CommitGraphFile`] never changes; a newer file on disk is
//! picked up by opening it again, see [`CommitGraphFile::needs_refresh`].

use crate::mapping::GraphBytes;
use crate::{GraphConfig, Result, StorageError};
use commitgraph_format::CommitGraph;
use commitgraph_oid::{OID_RAW_SIZE, ObjectId};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// A validated commit-graph file and the path it was opened from
#[derive(Debug)]
pub struct CommitGraphFile {
    path: PathBuf,
    graph: CommitGraph<GraphBytes>,
}

impl CommitGraphFile {
    /// Open the file at `path` with default settings
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(&GraphConfig::new(path))
    }

    /// Open the file named by `config`
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read,
    /// [`StorageError::NotRegularFile`] or [`StorageError::TooLarge`] if it
    /// is unsuitable, and [`StorageError::Graph`] if validation fails.
    pub fn open_with(config: &GraphConfig) -> Result<Self> {
        let path = config.path.clone();
        let file = File::open(&path)?;
        let metadata = file.metadata()?;

        if !metadata.is_file() {
            return Err(StorageError::NotRegularFile(path));
        }
        let size = metadata.len();
        if size > config.max_file_size {
            return Err(StorageError::TooLarge {
                path,
                size,
                limit: config.max_file_size,
            });
        }

        let bytes = if config.use_mmap {
            GraphBytes::map(&file)?
        } else {
            GraphBytes::read(&file, size)?
        };
        debug!(
            "Opened commit-graph {} ({} bytes, mapped: {})",
            path.display(),
            size,
            bytes.is_mapped()
        );

        let graph = CommitGraph::parse(bytes).map_err(|e| {
            warn!("Discarding commit-graph {}: {}", path.display(), e);
            e
        })?;
        debug!(
            "Validated commit-graph {}: {} commits, {} extra edges",
            path.display(),
            graph.len(),
            graph.num_extra_edges()
        );

        Ok(Self { path, graph })
    }

    /// Path the file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The validated graph
    pub const fn graph(&self) -> &CommitGraph<GraphBytes> {
        &self.graph
    }

    /// Release the file and its mapping
    pub fn close(self) {
        debug!("Closing commit-graph {}", self.path.display());
    }

    /// Whether the file on disk differs from this one.
    ///
    /// Checks `path`, or the path this file was opened from. Returns `true`
    /// if the file cannot be opened or stat'ed, is not a regular file, has a
    /// different size, or its trailing checksum differs. Only the last 20
    /// bytes are read.
    pub fn needs_refresh(&self, path: Option<&Path>) -> bool {
        let path = path.unwrap_or(&self.path);
        match self.compare_on_disk(path) {
            Ok(stale) => {
                trace!("Checked commit-graph {}: stale = {}", path.display(), stale);
                stale
            }
            Err(e) => {
                trace!("Checking commit-graph {} failed: {}", path.display(), e);
                true
            }
        }
    }

    fn compare_on_disk(&self, path: &Path) -> std::io::Result<bool> {
        let mut file = File::open(path)?;
        let metadata = file.metadata()?;
        if !metadata.is_file() || metadata.len() != self.graph.as_bytes().len() as u64 {
            return Ok(true);
        }

        let mut trailer = [0u8; OID_RAW_SIZE];
        file.seek(SeekFrom::End(-(OID_RAW_SIZE as i64)))?;
        file.read_exact(&mut trailer)?;
        Ok(ObjectId::from_bytes(trailer) != *self.graph.checksum())
    }
}

impl Deref for CommitGraphFile {
    type Target = CommitGraph<GraphBytes>;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}
