//! Error types for commit-graph operations

use crate::chunk::ChunkId;
use commitgraph_oid::{ObjectId, OidError};
use thiserror::Error;

/// Commit-graph operation result type
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur when parsing, querying or building commit-graph files
#[derive(Debug, Error)]
pub enum GraphError {
    /// Buffer cannot even hold a header and a trailer
    #[error("Commit-graph is too short: {size} bytes")]
    TooShort {
        /// Size of the buffer in bytes
        size: usize,
    },

    /// Signature is not `CGPH`
    #[error("Invalid commit-graph signature: {0:02x?}")]
    InvalidSignature([u8; 4]),

    /// Unsupported file format version
    #[error("Unsupported commit-graph version: {0}")]
    UnsupportedVersion(u8),

    /// Unsupported object id (hash function) version
    #[error("Unsupported object id version: {0}")]
    UnsupportedOidVersion(u8),

    /// Header declares zero chunks
    #[error("No chunks in commit-graph")]
    NoChunks,

    /// Trailer would overlap the chunk directory
    #[error("Wrong commit-graph size: trailer at {trailer_offset}, chunk table ends at {table_end}")]
    WrongSize {
        /// Offset of the trailer checksum
        trailer_offset: u64,
        /// First offset a chunk may start at
        table_end: u64,
    },

    /// Chunk offsets decrease
    #[error("Chunks are non-monotonic: offset {offset} follows {previous}")]
    NonMonotonicChunks {
        /// Offending chunk offset
        offset: u64,
        /// Offset of the preceding chunk
        previous: u64,
    },

    /// Chunk starts at or past the trailer
    #[error("Chunk at offset {offset} extends beyond the trailer at {trailer_offset}")]
    ChunkBeyondTrailer {
        /// Offending chunk offset
        offset: u64,
        /// Offset of the trailer checksum
        trailer_offset: u64,
    },

    /// Chunk id is not part of the format
    #[error("Unrecognized chunk ID {0}")]
    UnknownChunk(ChunkId),

    /// The same chunk id appears twice in the directory
    #[error("Duplicate chunk ID {0}")]
    DuplicateChunk(ChunkId),

    /// A required chunk is absent
    #[error("Missing {0} chunk")]
    MissingChunk(&'static str),

    /// A required chunk has zero length
    #[error("Empty {0} chunk")]
    EmptyChunk(&'static str),

    /// A chunk's length does not match what the commit count requires
    #[error("{chunk} chunk has wrong length: expected {expected}, got {actual}")]
    ChunkLength {
        /// Chunk name
        chunk: &'static str,
        /// Required length in bytes
        expected: u64,
        /// Length found in the file
        actual: u64,
    },

    /// Extra edge list is not a whole number of 4-byte entries
    #[error("Malformed Extra Edge List chunk: length {0} is not a multiple of 4")]
    MalformedExtraEdges(u64),

    /// Fanout table decreases
    #[error("OID Fanout is non-monotonic at bucket {bucket}")]
    NonMonotonicFanout {
        /// First bucket whose count is below its predecessor
        bucket: usize,
    },

    /// OID lookup table is not strictly increasing
    #[error("OID Lookup is non-monotonic at index {index}")]
    NonMonotonicLookup {
        /// First index not greater than its predecessor
        index: u32,
    },

    /// A read would leave the buffer
    #[error("Read of {len} bytes at offset {offset} is out of bounds for {size} bytes")]
    OutOfBounds {
        /// Read offset
        offset: usize,
        /// Read length
        len: usize,
        /// Buffer size
        size: usize,
    },

    /// An extra edge run reaches the end of the list without its last-entry marker
    #[error("Extra edge run starting at {start} is not terminated")]
    UnterminatedEdges {
        /// First extra edge index of the run
        start: u32,
    },

    /// Trailer checksum does not match the file contents
    #[error("Commit-graph checksum mismatch: stored {expected}, computed {actual}")]
    ChecksumMismatch {
        /// Checksum stored in the trailer
        expected: ObjectId,
        /// Checksum computed over the file
        actual: ObjectId,
    },

    /// Commit position out of range
    #[error("Commit index {index} does not exist ({count} commits)")]
    CommitNotFound {
        /// Requested position
        index: u32,
        /// Number of commits in the graph
        count: u32,
    },

    /// Extra edge position out of range
    #[error("Extra edge index {index} does not exist ({count} edges)")]
    EdgeNotFound {
        /// Requested extra edge position
        index: u32,
        /// Number of extra edges in the graph
        count: u32,
    },

    /// Parent ordinal out of range
    #[error("Parent {n} does not exist (commit has {count} parents)")]
    ParentNotFound {
        /// Requested parent ordinal
        n: usize,
        /// Number of parents of the commit
        count: usize,
    },

    /// No commit matches the id or prefix
    #[error("No commit matches {prefix}")]
    IdNotFound {
        /// Hex prefix that was searched for
        prefix: String,
    },

    /// More than one commit matches a short prefix
    #[error("Prefix {prefix} matches multiple commits")]
    Ambiguous {
        /// Hex prefix that was searched for
        prefix: String,
    },

    /// A commit refers to a parent position outside the graph
    #[error("Commit {index} has invalid parent index {parent}")]
    InvalidParent {
        /// Commit position
        index: u32,
        /// Stored parent position
        parent: u32,
    },

    /// An id sits outside the fanout bucket of its leading byte
    #[error("Commit {index} is outside fanout bucket {bucket:#04x}")]
    FanoutMismatch {
        /// Commit position
        index: u32,
        /// Leading byte of the commit id
        bucket: u8,
    },

    /// A commit's generation is not above one of its parents
    #[error(
        "Commit {index} has generation {generation}, not above parent {parent} with generation {parent_generation}"
    )]
    GenerationOrder {
        /// Commit position
        index: u32,
        /// Commit generation
        generation: u32,
        /// Parent position
        parent: u32,
        /// Parent generation
        parent_generation: u32,
    },

    /// Builder was given no commits
    #[error("Commit-graph must contain at least one commit")]
    NoCommits,

    /// Builder was given the same commit twice
    #[error("Duplicate commit {0}")]
    DuplicateCommit(ObjectId),

    /// Builder was given a parent that is not part of the graph
    #[error("Commit {commit} references parent {parent} which is not in the graph")]
    UnknownParent {
        /// Child commit
        commit: ObjectId,
        /// Missing parent
        parent: ObjectId,
    },

    /// Generation does not fit in 30 bits
    #[error("Generation {0} exceeds 30 bits")]
    GenerationOverflow(u32),

    /// Commit time does not fit in 34 bits
    #[error("Commit time {0} exceeds 34 bits")]
    CommitTimeOverflow(u64),

    /// A count exceeds what the format can address
    #[error("Too many {0} for a commit-graph")]
    CapacityExceeded(&'static str),

    /// Object id error
    #[error("Object id error: {0}")]
    Oid(#[from] OidError),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),

    /// I/O error while writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Check if the file is structurally malformed
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::TooShort { .. }
                | Self::InvalidSignature(_)
                | Self::UnsupportedVersion(_)
                | Self::UnsupportedOidVersion(_)
                | Self::NoChunks
                | Self::WrongSize { .. }
                | Self::NonMonotonicChunks { .. }
                | Self::ChunkBeyondTrailer { .. }
                | Self::UnknownChunk(_)
                | Self::DuplicateChunk(_)
                | Self::MissingChunk(_)
                | Self::EmptyChunk(_)
                | Self::ChunkLength { .. }
                | Self::MalformedExtraEdges(_)
                | Self::NonMonotonicFanout { .. }
                | Self::NonMonotonicLookup { .. }
                | Self::OutOfBounds { .. }
                | Self::UnterminatedEdges { .. }
                | Self::InvalidParent { .. }
                | Self::FanoutMismatch { .. }
                | Self::GenerationOrder { .. }
                | Self::BinRw(_)
        )
    }

    /// Check if the file failed its checksum
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }

    /// Check if a lookup simply found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CommitNotFound { .. }
                | Self::EdgeNotFound { .. }
                | Self::ParentNotFound { .. }
                | Self::IdNotFound { .. }
        )
    }

    /// Check if a short prefix matched several commits
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    /// Check if the file must be discarded
    pub fn is_fatal(&self) -> bool {
        self.is_format_error() || self.is_integrity_error()
    }
}
