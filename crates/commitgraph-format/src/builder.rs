//! Builder for writing commit-graph files
//!
//! [`CommitGraphBuilder`] serialises commits whose tree, parents, generation
//! and commit time are already known. It does not walk history or derive
//! generation numbers; callers supply them.
//!
//! # Example
//!
//! ```rust
//! use commitgraph_format::{CommitGraph, CommitGraphBuilder, CommitRecord};
//! use commitgraph_oid::ObjectId;
//!
//! let root = ObjectId::from_data(b"root");
//! let child = ObjectId::from_data(b"child");
//! let tree = ObjectId::from_data(b"tree");
//!
//! let mut builder = CommitGraphBuilder::new();
//! builder.add_commit(CommitRecord::new(root, tree).with_generation(1));
//! builder.add_commit(
//!     CommitRecord::new(child, tree)
//!         .with_parents(vec![root])
//!         .with_generation(2),
//! );
//!
//! let bytes = builder.build().expect("Failed to build commit-graph");
//! let graph = CommitGraph::parse(bytes).expect("Failed to parse commit-graph");
//! assert_eq!(graph.len(), 2);
//! ```

use crate::chunk::{ChunkId, ChunkKind, FANOUT_BUCKETS};
use crate::entry::{
    COMMIT_TIME_MAX, EDGE_INDEX_MASK, EXTRA_EDGE_FLAG, GENERATION_MAX, MISSING_PARENT,
    pack_generation_time,
};
use crate::error::{GraphError, GraphResult};
use crate::header::{ChunkEntry, GraphHeader};
use binrw::BinWrite;
use commitgraph_oid::ObjectId;
use std::collections::HashMap;
use std::io::{Cursor, Write};

/// One commit to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit id
    pub id: ObjectId,
    /// Root tree id
    pub tree: ObjectId,
    /// Parent ids in parent order; all must be in the same graph
    pub parents: Vec<ObjectId>,
    /// Generation number (0 when unknown, at most 30 bits)
    pub generation: u32,
    /// Commit time in seconds since the UNIX epoch (at most 34 bits)
    pub commit_time: u64,
}

impl CommitRecord {
    /// Create a parentless record with unknown generation and zero time
    pub fn new(id: ObjectId, tree: ObjectId) -> Self {
        Self {
            id,
            tree,
            parents: Vec::new(),
            generation: 0,
            commit_time: 0,
        }
    }

    /// Set the parents
    #[must_use]
    pub fn with_parents(mut self, parents: Vec<ObjectId>) -> Self {
        self.parents = parents;
        self
    }

    /// Set the generation number
    #[must_use]
    pub const fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Set the commit time
    #[must_use]
    pub const fn with_commit_time(mut self, commit_time: u64) -> Self {
        self.commit_time = commit_time;
        self
    }
}

/// Builder for commit-graph files
#[derive(Debug, Clone, Default)]
pub struct CommitGraphBuilder {
    commits: Vec<CommitRecord>,
    extra_chunks: Vec<(ChunkId, Vec<u8>)>,
}

impl CommitGraphBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit
    pub fn add_commit(&mut self, record: CommitRecord) -> &mut Self {
        self.commits.push(record);
        self
    }

    /// Append an opaque chunk after the commit chunks.
    ///
    /// Intended for optional chunks such as bloom filters that readers may
    /// skip.
    #[must_use]
    pub fn with_extra_chunk(mut self, id: ChunkId, data: Vec<u8>) -> Self {
        self.extra_chunks.push((id, data));
        self
    }

    /// Number of commits added
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether no commits were added
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Serialise to bytes, including the trailer checksum
    pub fn build(&self) -> GraphResult<Vec<u8>> {
        if self.commits.is_empty() {
            return Err(GraphError::NoCommits);
        }
        if self.commits.len() >= MISSING_PARENT as usize {
            return Err(GraphError::CapacityExceeded("commits"));
        }

        let mut commits: Vec<&CommitRecord> = self.commits.iter().collect();
        commits.sort_by_key(|c| c.id);

        let mut positions = HashMap::with_capacity(commits.len());
        for (pos, commit) in commits.iter().enumerate() {
            if positions.insert(commit.id, pos as u32).is_some() {
                return Err(GraphError::DuplicateCommit(commit.id));
            }
        }

        let fanout = Self::build_fanout(&commits);
        let oid_lookup: Vec<u8> = commits
            .iter()
            .flat_map(|c| c.id.as_bytes().iter().copied())
            .collect();
        let (commit_data, extra_edges) = Self::build_commit_data(&commits, &positions)?;

        let mut chunks: Vec<(ChunkId, &[u8])> = vec![
            (ChunkKind::OidFanout.id(), fanout.as_slice()),
            (ChunkKind::OidLookup.id(), oid_lookup.as_slice()),
            (ChunkKind::CommitData.id(), commit_data.as_slice()),
        ];
        if !extra_edges.is_empty() {
            chunks.push((ChunkKind::ExtraEdgeList.id(), extra_edges.as_slice()));
        }
        let core = chunks.len();
        for (id, data) in &self.extra_chunks {
            if chunks[..core].iter().any(|(existing, _)| existing == id) {
                return Err(GraphError::DuplicateChunk(*id));
            }
            chunks.push((*id, data.as_slice()));
        }

        Self::write(&chunks)
    }

    fn build_fanout(commits: &[&CommitRecord]) -> Vec<u8> {
        let mut counts = [0u32; FANOUT_BUCKETS];
        for commit in commits {
            counts[usize::from(commit.id.first_byte())] += 1;
        }

        let mut fanout = Vec::with_capacity(FANOUT_BUCKETS * 4);
        let mut total = 0u32;
        for count in counts {
            total += count;
            fanout.extend_from_slice(&total.to_be_bytes());
        }
        fanout
    }

    fn build_commit_data(
        commits: &[&CommitRecord],
        positions: &HashMap<ObjectId, u32>,
    ) -> GraphResult<(Vec<u8>, Vec<u8>)> {
        let mut data = Vec::with_capacity(commits.len() * crate::chunk::COMMIT_DATA_SIZE);
        let mut edges: Vec<u32> = Vec::new();

        for commit in commits {
            if commit.generation > GENERATION_MAX {
                return Err(GraphError::GenerationOverflow(commit.generation));
            }
            if commit.commit_time > COMMIT_TIME_MAX {
                return Err(GraphError::CommitTimeOverflow(commit.commit_time));
            }

            let parents = commit
                .parents
                .iter()
                .map(|parent| {
                    positions
                        .get(parent)
                        .copied()
                        .ok_or(GraphError::UnknownParent {
                            commit: commit.id,
                            parent: *parent,
                        })
                })
                .collect::<GraphResult<Vec<u32>>>()?;

            let slots = match parents.as_slice() {
                [] => [MISSING_PARENT, MISSING_PARENT],
                [first] => [*first, MISSING_PARENT],
                [first, second] => [*first, *second],
                [first, rest @ ..] => {
                    let start = u32::try_from(edges.len())
                        .ok()
                        .filter(|&start| start <= EDGE_INDEX_MASK)
                        .ok_or(GraphError::CapacityExceeded("extra edges"))?;
                    edges.extend_from_slice(rest);
                    if let Some(last) = edges.last_mut() {
                        *last |= EXTRA_EDGE_FLAG;
                    }
                    [*first, EXTRA_EDGE_FLAG | start]
                }
            };

            let (high, low) = pack_generation_time(commit.generation, commit.commit_time);
            data.extend_from_slice(commit.tree.as_bytes());
            data.extend_from_slice(&slots[0].to_be_bytes());
            data.extend_from_slice(&slots[1].to_be_bytes());
            data.extend_from_slice(&high.to_be_bytes());
            data.extend_from_slice(&low.to_be_bytes());
        }

        let edges = edges.iter().flat_map(|e| e.to_be_bytes()).collect();
        Ok((data, edges))
    }

    fn write(chunks: &[(ChunkId, &[u8])]) -> GraphResult<Vec<u8>> {
        let chunk_count =
            u8::try_from(chunks.len()).map_err(|_| GraphError::CapacityExceeded("chunks"))?;
        let header = GraphHeader::new(chunk_count);

        let mut cursor = Cursor::new(Vec::new());
        header.write_be(&mut cursor)?;

        let mut offset = header.chunk_table_end() as u64;
        for (id, data) in chunks {
            ChunkEntry { id: *id, offset }.write_be(&mut cursor)?;
            offset += data.len() as u64;
        }
        ChunkEntry {
            id: ChunkId::TERMINATOR,
            offset,
        }
        .write_be(&mut cursor)?;

        for (_, data) in chunks {
            cursor.write_all(data)?;
        }

        let mut bytes = cursor.into_inner();
        let checksum = ObjectId::from_data(&bytes);
        bytes.extend_from_slice(checksum.as_bytes());
        Ok(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::oid;
    use crate::CommitGraph;

    #[test]
    fn test_empty_builder_fails() {
        assert!(matches!(
            CommitGraphBuilder::new().build(),
            Err(GraphError::NoCommits)
        ));
    }

    #[test]
    fn test_rejects_duplicates_and_unknown_parents() {
        let mut builder = CommitGraphBuilder::new();
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)));
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)));
        assert!(matches!(
            builder.build(),
            Err(GraphError::DuplicateCommit(_))
        ));

        let mut builder = CommitGraphBuilder::new();
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)).with_parents(vec![oid(2, 0)]));
        assert!(matches!(
            builder.build(),
            Err(GraphError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_fields() {
        let mut builder = CommitGraphBuilder::new();
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)).with_generation(1 << 30));
        assert!(matches!(
            builder.build(),
            Err(GraphError::GenerationOverflow(_))
        ));

        let mut builder = CommitGraphBuilder::new();
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)).with_commit_time(1 << 34));
        assert!(matches!(
            builder.build(),
            Err(GraphError::CommitTimeOverflow(_))
        ));
    }

    #[test]
    fn test_layout_of_written_file() {
        let mut builder = CommitGraphBuilder::new();
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)));
        let bytes = builder.build().unwrap();

        // header + 4 directory entries (3 chunks + terminator) + fanout + 1 id + 1 record + trailer
        assert_eq!(bytes.len(), 8 + 4 * 12 + 1024 + 20 + 36 + 20);
        assert_eq!(&bytes[..4], b"CGPH");
        assert_eq!(bytes[6], 3);

        let graph = CommitGraph::parse(bytes).unwrap();
        assert_eq!(graph.num_extra_edges(), 0);
    }

    #[test]
    fn test_extra_edges_are_terminated() {
        let mut builder = CommitGraphBuilder::new();
        for n in 1..=4 {
            builder.add_commit(CommitRecord::new(oid(n, 0), oid(9, 0)));
        }
        builder.add_commit(
            CommitRecord::new(oid(5, 0), oid(9, 0))
                .with_parents(vec![oid(1, 0), oid(2, 0), oid(3, 0), oid(4, 0)]),
        );
        let graph = CommitGraph::parse(builder.build().unwrap()).unwrap();

        assert_eq!(graph.num_extra_edges(), 3);
        let edges = &graph.as_bytes()[graph.layout().extra_edges.clone()];
        let words: Vec<u32> = edges
            .chunks_exact(4)
            .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        assert_eq!(words, vec![1, 2, 3 | EXTRA_EDGE_FLAG]);
    }

    #[test]
    fn test_extra_chunk_ids_must_be_unique() {
        let mut builder = CommitGraphBuilder::new();
        builder.add_commit(CommitRecord::new(oid(1, 0), oid(9, 0)));
        let builder = builder.with_extra_chunk(ChunkId::OID_FANOUT, vec![0; 4]);
        assert!(matches!(
            builder.build(),
            Err(GraphError::DuplicateChunk(ChunkId::OID_FANOUT))
        ));
    }
}
