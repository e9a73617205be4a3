//! Chunk directory walking and per-chunk validation
//!
//! The directory is read once into [`Chunk`] records. Each required chunk is
//! then checked by a pure validator and collected by [`LayoutBuilder`], which
//! only yields a [`GraphLayout`] once every mandatory chunk is present and
//! well-formed.

use crate::bytes::ByteView;
use crate::error::{GraphError, GraphResult};
use crate::header::{CHUNK_ENTRY_SIZE, ChunkEntry, GraphHeader, HEADER_SIZE};
use binrw::{BinRead, BinWrite};
use commitgraph_oid::OID_RAW_SIZE;
use std::fmt;
use std::io::Cursor;
use std::ops::Range;

/// Number of buckets in the fanout table
pub const FANOUT_BUCKETS: usize = 256;

/// Size of the fanout chunk in bytes
pub const FANOUT_SIZE: usize = FANOUT_BUCKETS * 4;

/// Size of one commit data record: tree id, two parent slots, two packed words
pub const COMMIT_DATA_SIZE: usize = OID_RAW_SIZE + 16;

/// Size of one extra edge list entry
pub const EXTRA_EDGE_SIZE: usize = 4;

/// Four-byte chunk tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, BinRead, BinWrite)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// OID Fanout: 'OIDF'
    pub const OID_FANOUT: Self = Self(*b"OIDF");
    /// OID Lookup: 'OIDL'
    pub const OID_LOOKUP: Self = Self(*b"OIDL");
    /// Commit Data: 'CDAT'
    pub const COMMIT_DATA: Self = Self(*b"CDAT");
    /// Extra Edge List: 'EDGE'
    pub const EXTRA_EDGE_LIST: Self = Self(*b"EDGE");
    /// Bloom filter index: 'BIDX'
    pub const BLOOM_INDEX: Self = Self(*b"BIDX");
    /// Bloom filter data: 'BDAT'
    pub const BLOOM_DATA: Self = Self(*b"BDAT");
    /// Id of the terminating directory entry
    pub const TERMINATOR: Self = Self([0; 4]);
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(u8::is_ascii_graphic) {
            self.0.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({self})")
    }
}

/// Closed set of chunk kinds a reader accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// 256-entry cumulative count table
    OidFanout,
    /// Sorted commit ids
    OidLookup,
    /// Fixed-size commit records
    CommitData,
    /// Overflow parents of octopus merges
    ExtraEdgeList,
    /// Recognised but not interpreted (bloom filters); skipped
    Unsupported(ChunkId),
}

impl ChunkKind {
    /// Human-readable chunk name used in errors
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OidFanout => "OID Fanout",
            Self::OidLookup => "OID Lookup",
            Self::CommitData => "Commit Data",
            Self::ExtraEdgeList => "Extra Edge List",
            Self::Unsupported(_) => "unsupported",
        }
    }

    /// Tag stored in the directory for this kind
    pub const fn id(&self) -> ChunkId {
        match self {
            Self::OidFanout => ChunkId::OID_FANOUT,
            Self::OidLookup => ChunkId::OID_LOOKUP,
            Self::CommitData => ChunkId::COMMIT_DATA,
            Self::ExtraEdgeList => ChunkId::EXTRA_EDGE_LIST,
            Self::Unsupported(id) => *id,
        }
    }
}

impl TryFrom<ChunkId> for ChunkKind {
    type Error = GraphError;

    fn try_from(id: ChunkId) -> GraphResult<Self> {
        match id {
            ChunkId::OID_FANOUT => Ok(Self::OidFanout),
            ChunkId::OID_LOOKUP => Ok(Self::OidLookup),
            ChunkId::COMMIT_DATA => Ok(Self::CommitData),
            ChunkId::EXTRA_EDGE_LIST => Ok(Self::ExtraEdgeList),
            ChunkId::BLOOM_INDEX | ChunkId::BLOOM_DATA => Ok(Self::Unsupported(id)),
            other => Err(GraphError::UnknownChunk(other)),
        }
    }
}

/// A chunk located in the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// What the chunk holds
    pub kind: ChunkKind,
    /// Absolute offset in the file
    pub offset: u64,
    /// Length in bytes, derived from the next chunk or the trailer
    pub length: u64,
}

impl Chunk {
    /// Byte range of the chunk within the file
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// Walk the chunk directory.
///
/// Offsets must not decrease, must not start before the end of the directory
/// and must lie before the trailer. Each chunk's length is backfilled from
/// the next chunk's offset; the last one runs up to the trailer.
pub fn read_chunk_table(
    view: ByteView<'_>,
    header: &GraphHeader,
    trailer_offset: usize,
) -> GraphResult<Vec<Chunk>> {
    let count = header.chunk_count as usize;
    let directory = view.slice(HEADER_SIZE, count * CHUNK_ENTRY_SIZE)?;
    let mut cursor = Cursor::new(directory);

    let trailer_offset = trailer_offset as u64;
    let mut previous = header.chunk_table_end() as u64;
    let mut chunks: Vec<Chunk> = Vec::with_capacity(count);

    for _ in 0..count {
        let entry = ChunkEntry::read_be(&mut cursor)?;
        if entry.offset < previous {
            return Err(GraphError::NonMonotonicChunks {
                offset: entry.offset,
                previous,
            });
        }
        if entry.offset >= trailer_offset {
            return Err(GraphError::ChunkBeyondTrailer {
                offset: entry.offset,
                trailer_offset,
            });
        }
        if let Some(last) = chunks.last_mut() {
            last.length = entry.offset - last.offset;
        }
        previous = entry.offset;

        chunks.push(Chunk {
            kind: ChunkKind::try_from(entry.id)?,
            offset: entry.offset,
            length: 0,
        });
    }

    if let Some(last) = chunks.last_mut() {
        last.length = trailer_offset - last.offset;
    }

    Ok(chunks)
}

/// Validated location of every chunk the reader interprets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphLayout {
    /// OID Fanout chunk
    pub fanout: Range<usize>,
    /// OID Lookup chunk
    pub oid_lookup: Range<usize>,
    /// Commit Data chunk
    pub commit_data: Range<usize>,
    /// Extra Edge List chunk (empty when absent)
    pub extra_edges: Range<usize>,
    /// Number of commits, the last fanout value
    pub num_commits: u32,
    /// Number of 4-byte entries in the extra edge list
    pub num_extra_edges: u32,
}

/// Collects chunks from the directory and validates them into a layout
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    fanout: Option<Chunk>,
    oid_lookup: Option<Chunk>,
    commit_data: Option<Chunk>,
    extra_edges: Option<Chunk>,
    skipped: Vec<Chunk>,
}

impl LayoutBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunk.
    ///
    /// Each core chunk may appear only once. Bloom chunks are skipped, and a
    /// repeated one is skipped again.
    pub fn push(&mut self, chunk: Chunk) -> GraphResult<()> {
        let slot = match chunk.kind {
            ChunkKind::OidFanout => &mut self.fanout,
            ChunkKind::OidLookup => &mut self.oid_lookup,
            ChunkKind::CommitData => &mut self.commit_data,
            ChunkKind::ExtraEdgeList => &mut self.extra_edges,
            ChunkKind::Unsupported(_) => {
                self.skipped.push(chunk);
                return Ok(());
            }
        };
        if slot.is_some() {
            return Err(GraphError::DuplicateChunk(chunk.kind.id()));
        }
        *slot = Some(chunk);
        Ok(())
    }

    /// Validate in order fanout, lookup, commit data, extra edges
    pub fn finish(self, view: ByteView<'_>) -> GraphResult<GraphLayout> {
        let (fanout, num_commits) = validate_fanout(view, self.fanout.as_ref())?;
        let oid_lookup = validate_oid_lookup(view, self.oid_lookup.as_ref(), num_commits)?;
        let commit_data = validate_commit_data(self.commit_data.as_ref(), num_commits)?;
        let (extra_edges, num_extra_edges) = validate_extra_edges(self.extra_edges.as_ref())?;

        Ok(GraphLayout {
            fanout,
            oid_lookup,
            commit_data,
            extra_edges,
            num_commits,
            num_extra_edges,
        })
    }
}

fn required<'c>(chunk: Option<&'c Chunk>, kind: ChunkKind) -> GraphResult<&'c Chunk> {
    let chunk = chunk.ok_or(GraphError::MissingChunk(kind.name()))?;
    if chunk.length == 0 {
        return Err(GraphError::EmptyChunk(kind.name()));
    }
    Ok(chunk)
}

fn expect_length(chunk: &Chunk, expected: u64) -> GraphResult<()> {
    if chunk.length != expected {
        return Err(GraphError::ChunkLength {
            chunk: chunk.kind.name(),
            expected,
            actual: chunk.length,
        });
    }
    Ok(())
}

/// Check the fanout is exactly 256 non-decreasing counts; returns the commit count
pub fn validate_fanout(
    view: ByteView<'_>,
    chunk: Option<&Chunk>,
) -> GraphResult<(Range<usize>, u32)> {
    let chunk = required(chunk, ChunkKind::OidFanout)?;
    expect_length(chunk, FANOUT_SIZE as u64)?;

    let range = chunk.range();
    let table = view.sub(&range)?;
    let mut count = 0u32;
    for bucket in 0..FANOUT_BUCKETS {
        let value = table.u32_be(bucket * 4)?;
        if value < count {
            return Err(GraphError::NonMonotonicFanout { bucket });
        }
        count = value;
    }

    Ok((range, count))
}

/// Check the lookup table holds `num_commits` strictly increasing ids
pub fn validate_oid_lookup(
    view: ByteView<'_>,
    chunk: Option<&Chunk>,
    num_commits: u32,
) -> GraphResult<Range<usize>> {
    let chunk = required(chunk, ChunkKind::OidLookup)?;
    expect_length(chunk, u64::from(num_commits) * OID_RAW_SIZE as u64)?;

    let range = chunk.range();
    let table = view.sub(&range)?.as_slice();
    let ids = table.chunks_exact(OID_RAW_SIZE);
    for (index, (previous, current)) in ids.clone().zip(ids.skip(1)).enumerate() {
        if previous >= current {
            return Err(GraphError::NonMonotonicLookup {
                index: index as u32 + 1,
            });
        }
    }

    Ok(range)
}

/// Check the commit data holds one record per commit
pub fn validate_commit_data(chunk: Option<&Chunk>, num_commits: u32) -> GraphResult<Range<usize>> {
    let chunk = required(chunk, ChunkKind::CommitData)?;
    expect_length(chunk, u64::from(num_commits) * COMMIT_DATA_SIZE as u64)?;
    Ok(chunk.range())
}

/// Check the optional extra edge list is whole 4-byte entries
pub fn validate_extra_edges(chunk: Option<&Chunk>) -> GraphResult<(Range<usize>, u32)> {
    let Some(chunk) = chunk else {
        return Ok((0..0, 0));
    };
    if chunk.length == 0 {
        return Ok((0..0, 0));
    }
    if chunk.length % EXTRA_EDGE_SIZE as u64 != 0 {
        return Err(GraphError::MalformedExtraEdges(chunk.length));
    }
    let count = u32::try_from(chunk.length / EXTRA_EDGE_SIZE as u64)
        .map_err(|_| GraphError::CapacityExceeded("extra edges"))?;
    Ok((chunk.range(), count))
}
