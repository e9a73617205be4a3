//! Atomically replaced commit-graph snapshots
//!
//! Readers take an `Arc` to the current file and keep using it for as long
//! as they like. A reload opens a new file and swaps the pointer; the old
//! file is freed when its last reader drops it.

use crate::{CommitGraphFile, GraphConfig, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The current commit-graph of a repository, shared between threads
#[derive(Debug)]
pub struct SharedCommitGraph {
    config: GraphConfig,
    current: RwLock<Option<Arc<CommitGraphFile>>>,
}

impl SharedCommitGraph {
    /// Create an empty handle; nothing is opened until [`Self::refresh`]
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
        }
    }

    /// Configuration used for every open
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The current file, if one is loaded
    pub fn snapshot(&self) -> Option<Arc<CommitGraphFile>> {
        self.current.read().clone()
    }

    /// Reload the file if it changed on disk.
    ///
    /// Returns `Ok(true)` when a different snapshot (or none) was published.
    /// A file that disappeared publishes `None`. A file that fails to open or
    /// validate also publishes `None` and returns the error, so callers fall
    /// back to reading commits directly.
    pub fn refresh(&self) -> Result<bool> {
        let fresh = self
            .snapshot()
            .is_some_and(|graph| !graph.needs_refresh(Some(&self.config.path)));
        if fresh {
            return Ok(false);
        }

        match CommitGraphFile::open_with(&self.config) {
            Ok(graph) => {
                info!(
                    "Publishing commit-graph {} with {} commits",
                    graph.path().display(),
                    graph.len()
                );
                self.publish(Some(Arc::new(graph)));
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!("No commit-graph at {}", self.config.path.display());
                Ok(self.publish(None))
            }
            Err(e) => {
                warn!(
                    "Dropping commit-graph {}: {}",
                    self.config.path.display(),
                    e
                );
                self.publish(None);
                Err(e)
            }
        }
    }

    /// Drop the current snapshot; readers holding it are unaffected
    pub fn clear(&self) -> bool {
        self.publish(None)
    }

    /// Swap in `next`, returning whether a snapshot was replaced or removed
    fn publish(&self, next: Option<Arc<CommitGraphFile>>) -> bool {
        let changed = next.is_some();
        let previous = std::mem::replace(&mut *self.current.write(), next);
        changed || previous.is_some()
    }
}
