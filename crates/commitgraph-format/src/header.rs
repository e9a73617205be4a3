//! Commit-graph header and chunk directory entries

use crate::chunk::ChunkId;
use crate::error::{GraphError, GraphResult};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// File signature: 'CGPH'
pub const SIGNATURE: [u8; 4] = *b"CGPH";

/// Supported file format version
pub const GRAPH_VERSION: u8 = 1;

/// Object id version for SHA-1
pub const OID_VERSION_SHA1: u8 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 8;

/// Size of one chunk directory entry in bytes
pub const CHUNK_ENTRY_SIZE: usize = 12;

/// Commit-graph file header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct GraphHeader {
    /// Magic bytes: 'CGPH'
    pub signature: [u8; 4],

    /// Format version (must be 1)
    pub version: u8,

    /// Hash function version (1 = SHA-1)
    pub oid_version: u8,

    /// Number of chunks in the directory, excluding the terminating entry
    pub chunk_count: u8,

    /// Number of base graph files this file builds on
    ///
    /// Exposed for callers; chains of commit-graph files are not followed.
    pub base_graph_count: u8,
}

impl GraphHeader {
    /// Create a header for a standalone SHA-1 graph
    pub const fn new(chunk_count: u8) -> Self {
        Self {
            signature: SIGNATURE,
            version: GRAPH_VERSION,
            oid_version: OID_VERSION_SHA1,
            chunk_count,
            base_graph_count: 0,
        }
    }

    /// Read and validate the header at the start of `data`
    pub fn parse(data: &[u8]) -> GraphResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(GraphError::TooShort { size: data.len() });
        }
        let header = Self::read_be(&mut Cursor::new(&data[..HEADER_SIZE]))?;
        header.validate()?;
        Ok(header)
    }

    /// Validate signature, versions and chunk count
    pub fn validate(&self) -> GraphResult<()> {
        if self.signature != SIGNATURE {
            return Err(GraphError::InvalidSignature(self.signature));
        }
        if self.version != GRAPH_VERSION {
            return Err(GraphError::UnsupportedVersion(self.version));
        }
        if self.oid_version != OID_VERSION_SHA1 {
            return Err(GraphError::UnsupportedOidVersion(self.oid_version));
        }
        if self.chunk_count == 0 {
            return Err(GraphError::NoChunks);
        }
        Ok(())
    }

    /// First offset a chunk may start at.
    ///
    /// The directory holds one entry per chunk plus a terminating entry.
    pub const fn chunk_table_end(&self) -> usize {
        HEADER_SIZE + (self.chunk_count as usize + 1) * CHUNK_ENTRY_SIZE
    }
}

/// Chunk directory entry (12 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct ChunkEntry {
    /// Chunk tag
    pub id: ChunkId,
    /// Absolute offset of the chunk in the file
    pub offset: u64,
}
