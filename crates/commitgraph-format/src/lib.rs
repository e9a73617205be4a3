//! Parser and builder for the commit-graph file format
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! A commit-graph caches, for every commit in a repository, its tree id,
//! parent positions, generation number and commit time in a single
//! checksummed file so history walks need not inflate commit objects.
//!
//! # File Layout
//!
//! - **Header**: `CGPH` signature, version, hash version, chunk count
//! - **Chunk directory**: 12-byte `(id, offset)` entries plus a terminator
//! - **OID Fanout** (`OIDF`): 256 cumulative counts keyed by first id byte
//! - **OID Lookup** (`OIDL`): sorted 20-byte commit ids
//! - **Commit Data** (`CDAT`): one 36-byte record per commit
//! - **Extra Edge List** (`EDGE`): parents beyond the second for octopus merges
//! - **Trailer**: SHA-1 over everything before it
//!
//! Bloom filter chunks (`BIDX`, `BDAT`) are accepted and skipped.
//!
//! # Design Principles
//!
//! - **Validate once**: [`CommitGraph::parse`] checks the checksum and every
//!   chunk before returning; afterwards the graph is immutable
//! - **Bounds-checked reads**: corrupt records surface as errors, never panics
//! - **Generic storage**: the graph borrows nothing and owns any `AsRef<[u8]>`
//!
//! # Example
//!
//! ```rust
//! use commitgraph_format::{CommitGraph, CommitGraphBuilder, CommitRecord, ObjectId};
//!
//! let parent = ObjectId::from_data(b"parent");
//! let child = ObjectId::from_data(b"child");
//! let tree = ObjectId::from_data(b"tree");
//!
//! let mut builder = CommitGraphBuilder::new();
//! builder.add_commit(CommitRecord::new(parent, tree).with_generation(1));
//! builder.add_commit(
//!     CommitRecord::new(child, tree)
//!         .with_parents(vec![parent])
//!         .with_generation(2),
//! );
//! let graph = CommitGraph::parse(builder.build().unwrap()).unwrap();
//!
//! let entry = graph.find_hex(&child.to_hex()[..10]).unwrap();
//! assert_eq!(entry.parent_count, 1);
//! assert_eq!(graph.entry_parent(&entry, 0).unwrap().id, parent);
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod bytes;
pub mod chunk;
pub mod entry;
pub mod error;
pub mod graph;
pub mod header;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use builder::{CommitGraphBuilder, CommitRecord};
pub use chunk::{COMMIT_DATA_SIZE, ChunkId, ChunkKind, GraphLayout};
pub use entry::{EXTRA_EDGE_FLAG, Entry, MISSING_PARENT};
pub use error::{GraphError, GraphResult};
pub use graph::{CommitGraph, Lookup};
pub use header::GraphHeader;

pub use commitgraph_oid::ObjectId;
