//! On-disk commit-graph files for repository object stores.
//!
//! This crate opens the commit-graph file of a repository, keeps it
//! memory-mapped for lock-free concurrent reads, and decides when the file
//! on disk has been replaced so a fresh copy can be loaded:
//!
//! - **[`CommitGraphFile`]**: one opened, validated file; derefs to
//!   [`CommitGraph`](commitgraph_format::CommitGraph)
//! - **[`SharedCommitGraph`]**: the current file behind an `Arc`, swapped
//!   atomically on reload and retired once no reader holds it
//! - **[`GraphConfig`]**: path, mapping and size limits
//!
//! # Example
//!
//! ```rust,no_run
//! use commitgraph_storage::{GraphConfig, SharedCommitGraph};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GraphConfig::for_objects_dir(".git/objects");
//! let shared = SharedCommitGraph::new(config);
//! shared.refresh()?;
//!
//! if let Some(graph) = shared.snapshot() {
//!     let head = graph.find_hex("4b825dc")?;
//!     println!("{} has {} parents", head.id, head.parent_count);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use commitgraph_format::GraphError;
use std::path::PathBuf;
use thiserror::Error;

// Configuration
pub mod config;
// Opened graph files
pub mod file;
// Backing byte storage
pub mod mapping;
// Snapshot publication
pub mod shared;

pub use config::GraphConfig;
pub use file::CommitGraphFile;
pub use mapping::GraphBytes;
pub use shared::SharedCommitGraph;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while opening or reloading a commit-graph file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file was read but is not a valid commit-graph.
    #[error("Commit-graph error: {0}")]
    Graph(#[from] GraphError),

    /// The path names a directory, device or other non-regular file.
    #[error("Not a regular file: {}", .0.display())]
    NotRegularFile(PathBuf),

    /// The file exceeds the configured size limit.
    #[error("Commit-graph {} is {size} bytes, limit is {limit}", path.display())]
    TooLarge {
        /// Path of the file
        path: PathBuf,
        /// Size on disk
        size: u64,
        /// Configured limit
        limit: u64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Check if the file simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Check if the file exists but must not be trusted
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Graph(e) if e.is_fatal())
    }
}

/// Version information for the storage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Location of the commit-graph file relative to an objects directory.
pub const COMMIT_GRAPH_PATH: &str = "info/commit-graph";
