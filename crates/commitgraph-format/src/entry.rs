//! Decoded commit records
//!
//! Each commit data record is a tree id followed by four big-endian words:
//!
//! ```text
//! +-----------+----------+----------+--------------------+-------------+
//! | tree (20) | parent 1 | parent 2 | gen << 2 | time hi | time lo (32) |
//! +-----------+----------+----------+--------------------+-------------+
//! ```
//!
//! A parent slot of [`MISSING_PARENT`] is empty. When the second slot has
//! [`EXTRA_EDGE_FLAG`] set, its low 31 bits index a run in the extra edge
//! list holding the second and later parents; the run's last entry carries
//! [`EXTRA_EDGE_FLAG`].

use crate::bytes::ByteView;
use crate::chunk::COMMIT_DATA_SIZE;
use crate::error::GraphResult;
use commitgraph_oid::{OID_RAW_SIZE, ObjectId};

/// Parent slot value meaning "no parent"
pub const MISSING_PARENT: u32 = 0x7000_0000;

/// High bit of a parent slot or extra edge entry
pub const EXTRA_EDGE_FLAG: u32 = 0x8000_0000;

/// Mask extracting an index from a flagged slot or edge entry
pub const EDGE_INDEX_MASK: u32 = 0x7fff_ffff;

/// Largest generation number representable in 30 bits
pub const GENERATION_MAX: u32 = 0x3fff_ffff;

/// Largest commit time representable in 34 bits
pub const COMMIT_TIME_MAX: u64 = (1 << 34) - 1;

/// A commit as cached in the commit-graph
///
/// Produced on demand by the reader; the caller owns the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Position of the commit in the graph
    pub index: u32,
    /// Commit id
    pub id: ObjectId,
    /// Root tree id
    pub tree_id: ObjectId,
    /// Raw inline parent slots
    pub parent_indices: [u32; 2],
    /// Number of parents, inline and extra
    pub parent_count: usize,
    /// Start of this commit's run in the extra edge list
    pub extra_parents_start: Option<u32>,
    /// Generation number (0 when unknown)
    pub generation: u32,
    /// Commit time in seconds since the UNIX epoch
    pub commit_time: u64,
}

impl Entry {
    /// Whether the commit is a merge
    pub const fn is_merge(&self) -> bool {
        self.parent_count > 1
    }

    /// Whether the commit has no parents
    pub const fn is_root(&self) -> bool {
        self.parent_count == 0
    }
}

/// Fields read straight out of one commit data record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawRecord {
    pub tree_id: ObjectId,
    pub parents: [u32; 2],
    pub generation: u32,
    pub commit_time: u64,
}

impl RawRecord {
    /// Decode record `pos` of the commit data chunk
    pub fn read(commit_data: ByteView<'_>, pos: usize) -> GraphResult<Self> {
        let base = pos * COMMIT_DATA_SIZE;
        let tree_id = commit_data.oid(base)?;
        let parents = [
            commit_data.u32_be(base + OID_RAW_SIZE)?,
            commit_data.u32_be(base + OID_RAW_SIZE + 4)?,
        ];
        let (generation, commit_time) = unpack_generation_time(
            commit_data.u32_be(base + OID_RAW_SIZE + 8)?,
            commit_data.u32_be(base + OID_RAW_SIZE + 12)?,
        );
        Ok(Self {
            tree_id,
            parents,
            generation,
            commit_time,
        })
    }

    /// Number of inline slots that hold a parent or an edge pointer
    pub fn inline_count(&self) -> usize {
        self.parents
            .iter()
            .filter(|&&slot| slot != MISSING_PARENT)
            .count()
    }

    /// Extra edge list start, when the second slot points there
    pub fn extra_edges_start(&self) -> Option<u32> {
        let slot = self.parents[1];
        (slot != MISSING_PARENT && slot & EXTRA_EDGE_FLAG != 0).then_some(slot & EDGE_INDEX_MASK)
    }
}

/// Split the two trailing words into generation and commit time.
///
/// The high word carries the generation in its upper 30 bits and the top two
/// bits of the 34-bit commit time in its lower 2 bits.
pub const fn unpack_generation_time(high: u32, low: u32) -> (u32, u64) {
    let commit_time = ((high as u64 & 0x3) << 32) | low as u64;
    (high >> 2, commit_time)
}

/// Inverse of [`unpack_generation_time`]; inputs must already fit their widths
pub const fn pack_generation_time(generation: u32, commit_time: u64) -> (u32, u32) {
    let high = (generation << 2) | ((commit_time >> 32) as u32 & 0x3);
    (high, commit_time as u32)
}
