//! Validated commit-graph and its read operations

use crate::bytes::ByteView;
use crate::chunk::{EXTRA_EDGE_SIZE, GraphLayout, LayoutBuilder, read_chunk_table};
use crate::entry::{EDGE_INDEX_MASK, EXTRA_EDGE_FLAG, Entry, GENERATION_MAX, RawRecord};
use crate::error::{GraphError, GraphResult};
use crate::header::{GraphHeader, HEADER_SIZE};
use commitgraph_oid::{OID_HEX_SIZE, OID_RAW_SIZE, ObjectId, lookup};
use std::fmt;

/// Outcome of resolving an id or prefix against the lookup table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Exactly one commit matches, at this position
    Exact(u32),
    /// No commit matches
    NotFound,
    /// A short prefix matches more than one commit
    Ambiguous,
}

/// A parsed, fully validated commit-graph
///
/// `B` owns the bytes: a `Vec<u8>` for in-memory graphs, or a memory map
/// when opened from disk. The structure is immutable once constructed, so
/// every read below can run concurrently from many threads.
pub struct CommitGraph<B = Vec<u8>> {
    data: B,
    header: GraphHeader,
    layout: GraphLayout,
    checksum: ObjectId,
}

impl<B: AsRef<[u8]>> CommitGraph<B> {
    /// Parse and validate a commit-graph held in `data`.
    ///
    /// The trailer checksum is verified before any chunk is trusted. No
    /// partially valid graph is ever returned.
    pub fn parse(data: B) -> GraphResult<Self> {
        let bytes = data.as_ref();
        let size = bytes.len();
        if size < HEADER_SIZE + OID_RAW_SIZE {
            return Err(GraphError::TooShort { size });
        }

        let header = GraphHeader::parse(bytes)?;
        let table_end = header.chunk_table_end();
        let trailer_offset = size - OID_RAW_SIZE;
        if trailer_offset < table_end {
            return Err(GraphError::WrongSize {
                trailer_offset: trailer_offset as u64,
                table_end: table_end as u64,
            });
        }

        let view = ByteView::new(bytes);
        let checksum = view.oid(trailer_offset)?;
        let actual = ObjectId::from_data(&bytes[..trailer_offset]);
        if actual != checksum {
            return Err(GraphError::ChecksumMismatch {
                expected: checksum,
                actual,
            });
        }

        let mut builder = LayoutBuilder::new();
        for chunk in read_chunk_table(view, &header, trailer_offset)? {
            builder.push(chunk)?;
        }
        let layout = builder.finish(view)?;

        Ok(Self {
            data,
            header,
            layout,
            checksum,
        })
    }

    fn view(&self) -> ByteView<'_> {
        ByteView::new(self.data.as_ref())
    }

    /// Raw bytes of the whole file
    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Release the graph, returning the backing bytes
    pub fn into_inner(self) -> B {
        self.data
    }

    /// File header
    pub const fn header(&self) -> &GraphHeader {
        &self.header
    }

    /// Chunk locations
    pub const fn layout(&self) -> &GraphLayout {
        &self.layout
    }

    /// Trailer checksum
    pub const fn checksum(&self) -> &ObjectId {
        &self.checksum
    }

    /// Number of commits
    pub const fn len(&self) -> u32 {
        self.layout.num_commits
    }

    /// Whether the graph has no commits (never true for a parsed graph)
    pub const fn is_empty(&self) -> bool {
        self.layout.num_commits == 0
    }

    /// Number of entries in the extra edge list
    pub const fn num_extra_edges(&self) -> u32 {
        self.layout.num_extra_edges
    }

    /// Cumulative count of commits whose first byte is at most `bucket`
    pub fn fanout_at(&self, bucket: u8) -> GraphResult<u32> {
        self.view()
            .sub(&self.layout.fanout)?
            .u32_be(usize::from(bucket) * 4)
    }

    fn oid_table(&self) -> &[u8] {
        self.data
            .as_ref()
            .get(self.layout.oid_lookup.clone())
            .unwrap_or_default()
    }

    /// Commit id at position `index`
    pub fn id_at(&self, index: u32) -> GraphResult<ObjectId> {
        self.check_index(index)?;
        self.view()
            .sub(&self.layout.oid_lookup)?
            .oid(index as usize * OID_RAW_SIZE)
    }

    /// Whether `id` is in the graph
    pub fn contains(&self, id: &ObjectId) -> bool {
        matches!(self.lookup(id, OID_HEX_SIZE), Lookup::Exact(_))
    }

    fn check_index(&self, index: u32) -> GraphResult<()> {
        if index >= self.layout.num_commits {
            return Err(GraphError::CommitNotFound {
                index,
                count: self.layout.num_commits,
            });
        }
        Ok(())
    }

    fn extra_edge(&self, index: u32) -> GraphResult<u32> {
        if index >= self.layout.num_extra_edges {
            return Err(GraphError::EdgeNotFound {
                index,
                count: self.layout.num_extra_edges,
            });
        }
        self.view()
            .sub(&self.layout.extra_edges)?
            .u32_be(index as usize * EXTRA_EDGE_SIZE)
    }

    /// Decode the commit at position `index`
    pub fn entry_at(&self, index: u32) -> GraphResult<Entry> {
        self.check_index(index)?;
        let commit_data = self.view().sub(&self.layout.commit_data)?;
        let raw = RawRecord::read(commit_data, index as usize)?;

        let mut parent_count = raw.inline_count();
        let extra_parents_start = raw.extra_edges_start();
        if let Some(start) = extra_parents_start {
            // The flagged slot counted above stands for the whole run
            parent_count = parent_count - 1 + self.edge_run_len(start)?;
        }

        Ok(Entry {
            index,
            id: self.id_at(index)?,
            tree_id: raw.tree_id,
            parent_indices: raw.parents,
            parent_count,
            extra_parents_start,
            generation: raw.generation,
            commit_time: raw.commit_time,
        })
    }

    /// Length of the extra edge run starting at `start`, including its last entry
    fn edge_run_len(&self, start: u32) -> GraphResult<usize> {
        // Bounds-checks `start` itself before walking
        self.extra_edge(start)?;

        let mut pos = start;
        loop {
            if pos >= self.layout.num_extra_edges {
                return Err(GraphError::UnterminatedEdges { start });
            }
            if self.extra_edge(pos)? & EXTRA_EDGE_FLAG != 0 {
                return Ok((pos - start) as usize + 1);
            }
            pos += 1;
        }
    }

    /// Resolve an id prefix of `hex_len` hex digits to a position.
    ///
    /// A length of [`OID_HEX_SIZE`] or more requires an exact match and can
    /// never be ambiguous. Digits of `prefix` past `hex_len` are ignored.
    pub fn lookup(&self, prefix: &ObjectId, hex_len: usize) -> Lookup {
        let hex_len = hex_len.min(OID_HEX_SIZE);
        let key = prefix.masked(hex_len);
        let num_commits = self.layout.num_commits as usize;
        let table = self.oid_table();
        let Ok((lo, hi)) = self.candidate_range(key.first_byte(), hex_len) else {
            return Lookup::NotFound;
        };

        let matches_at = |pos: usize| {
            lookup::id_at(table, pos).is_some_and(|id| id.prefix_matches(&key, hex_len))
        };

        // The key sorts before every id sharing the prefix, so the first
        // match is at the search position and a second one right after it
        let pos = match lookup::search(table, lo, hi, &key) {
            Ok(pos) => pos,
            Err(pos) => {
                if pos >= num_commits || !matches_at(pos) {
                    return Lookup::NotFound;
                }
                pos
            }
        };

        if hex_len < OID_HEX_SIZE && pos + 1 < num_commits && matches_at(pos + 1) {
            return Lookup::Ambiguous;
        }

        Lookup::Exact(pos as u32)
    }

    /// Fanout range of positions that can hold ids sharing the prefix
    fn candidate_range(&self, first: u8, hex_len: usize) -> GraphResult<(usize, usize)> {
        let (low_bucket, high_bucket) = match hex_len {
            0 => (0x00, 0xff),
            1 => (first & 0xf0, first | 0x0f),
            _ => (first, first),
        };
        let lo = match low_bucket {
            0 => 0,
            bucket => self.fanout_at(bucket - 1)?,
        };
        let hi = self.fanout_at(high_bucket)?;
        Ok((lo as usize, hi as usize))
    }

    /// Find the commit matching an id prefix of `hex_len` hex digits
    pub fn find(&self, prefix: &ObjectId, hex_len: usize) -> GraphResult<Entry> {
        match self.lookup(prefix, hex_len) {
            Lookup::Exact(index) => self.entry_at(index),
            Lookup::NotFound => Err(GraphError::IdNotFound {
                prefix: short_hex(prefix, hex_len),
            }),
            Lookup::Ambiguous => Err(GraphError::Ambiguous {
                prefix: short_hex(prefix, hex_len),
            }),
        }
    }

    /// Find the commit matching an abbreviated hex id
    pub fn find_hex(&self, hex: &str) -> GraphResult<Entry> {
        let (prefix, hex_len) = ObjectId::from_hex_prefix(hex)?;
        self.find(&prefix, hex_len)
    }

    /// Position of parent `n` of `entry`, without decoding it.
    ///
    /// Parent 0 comes from the first inline slot. Parent 1 comes from the
    /// second inline slot unless the commit spills into the extra edge list,
    /// in which case parents 1.. are read from the run in stored order.
    pub fn parent_index(&self, entry: &Entry, n: usize) -> GraphResult<u32> {
        if n >= entry.parent_count {
            return Err(GraphError::ParentNotFound {
                n,
                count: entry.parent_count,
            });
        }

        // Without an edge run the record holds at most two parents, so
        // (1, None) is the same case as n == 1 with parent_count == 2
        match (n, entry.extra_parents_start) {
            (0, _) | (1, None) => Ok(entry.parent_indices[n]),
            (_, Some(start)) => {
                let offset = u32::try_from(n - 1).map_err(|_| GraphError::ParentNotFound {
                    n,
                    count: entry.parent_count,
                })?;
                let index = start.checked_add(offset).ok_or(GraphError::EdgeNotFound {
                    index: u32::MAX,
                    count: self.layout.num_extra_edges,
                })?;
                Ok(self.extra_edge(index)? & EDGE_INDEX_MASK)
            }
            (_, None) => Err(GraphError::ParentNotFound {
                n,
                count: entry.parent_count,
            }),
        }
    }

    /// Decode parent `n` of `entry`
    pub fn entry_parent(&self, entry: &Entry, n: usize) -> GraphResult<Entry> {
        self.entry_at(self.parent_index(entry, n)?)
    }

    /// All parents of `entry`, in parent order
    pub fn parents(&self, entry: &Entry) -> impl Iterator<Item = GraphResult<Entry>> + '_ {
        let entry = *entry;
        (0..entry.parent_count).map(move |n| self.entry_parent(&entry, n))
    }

    /// All commits in id order
    pub fn iter(&self) -> impl Iterator<Item = GraphResult<Entry>> + '_ {
        (0..self.layout.num_commits).map(move |index| self.entry_at(index))
    }

    /// Cross-check every record.
    ///
    /// Verifies that ids sit in their fanout bucket, parent positions are in
    /// range, extra edge runs terminate, and each known generation is above
    /// its parents' (generations at the 30-bit cap are exempt).
    pub fn verify(&self) -> GraphResult<()> {
        for entry in self.iter() {
            let entry = entry?;

            let bucket = entry.id.first_byte();
            let (lo, hi) = self.candidate_range(bucket, OID_HEX_SIZE)?;
            if !(lo..hi).contains(&(entry.index as usize)) {
                return Err(GraphError::FanoutMismatch {
                    index: entry.index,
                    bucket,
                });
            }

            for n in 0..entry.parent_count {
                let parent = self.parent_index(&entry, n)?;
                if parent >= self.layout.num_commits {
                    return Err(GraphError::InvalidParent {
                        index: entry.index,
                        parent,
                    });
                }
                let parent_generation = self.entry_at(parent)?.generation;
                if entry.generation != 0
                    && parent_generation != 0
                    && entry.generation < GENERATION_MAX
                    && entry.generation <= parent_generation
                {
                    return Err(GraphError::GenerationOrder {
                        index: entry.index,
                        generation: entry.generation,
                        parent,
                        parent_generation,
                    });
                }
            }
        }
        Ok(())
    }
}

fn short_hex(prefix: &ObjectId, hex_len: usize) -> String {
    let mut hex = prefix.to_hex();
    hex.truncate(hex_len.min(OID_HEX_SIZE));
    hex
}

impl<B> fmt::Debug for CommitGraph<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitGraph")
            .field("header", &self.header)
            .field("num_commits", &self.layout.num_commits)
            .field("num_extra_edges", &self.layout.num_extra_edges)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{graph_bytes, oid, reseal};
    use crate::{CommitGraphBuilder, CommitRecord};
    use pretty_assertions::assert_eq;

    /// Three commits; commit 1 is a merge of commits 0 and 2
    fn three_commits() -> CommitGraph {
        let base = oid(0x10, 0);
        let side = oid(0x30, 0);
        let merge = oid(0x20, 0);
        let bytes = graph_bytes(vec![
            CommitRecord::new(base, oid(0xa0, 0)).with_generation(1).with_commit_time(100),
            CommitRecord::new(side, oid(0xa1, 0)).with_generation(1).with_commit_time(200),
            CommitRecord::new(merge, oid(0xa2, 0))
                .with_parents(vec![base, side])
                .with_generation(2)
                .with_commit_time(300),
        ]);
        CommitGraph::parse(bytes).unwrap()
    }

    #[test]
    fn test_merge_parents_inline() {
        let graph = three_commits();
        assert_eq!(graph.len(), 3);

        let merge = graph.find(&oid(0x20, 0), OID_HEX_SIZE).unwrap();
        assert_eq!(merge.index, 1);
        assert_eq!(merge.parent_count, 2);
        assert_eq!(merge.extra_parents_start, None);
        assert_eq!(merge.tree_id, oid(0xa2, 0));
        assert_eq!(merge.generation, 2);
        assert_eq!(merge.commit_time, 300);

        let first = graph.entry_parent(&merge, 0).unwrap();
        let second = graph.entry_parent(&merge, 1).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.id, oid(0x10, 0));
        assert_eq!(second.index, 2);
        assert_eq!(second.id, oid(0x30, 0));

        assert!(matches!(
            graph.entry_parent(&merge, 2),
            Err(GraphError::ParentNotFound { n: 2, count: 2 })
        ));
    }

    #[test]
    fn test_entry_at_out_of_range() {
        let graph = three_commits();
        let err = graph.entry_at(3).unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            GraphError::CommitNotFound { index: 3, count: 3 }
        ));
    }

    #[test]
    fn test_lookup_absent_and_prefixes() {
        let graph = three_commits();
        assert_eq!(graph.lookup(&oid(0x21, 0), OID_HEX_SIZE), Lookup::NotFound);
        assert_eq!(graph.lookup(&oid(0x20, 0), 2), Lookup::Exact(1));
        assert_eq!(graph.lookup(&oid(0x20, 0), 1), Lookup::Exact(1));
        // Leading nibble shared by nothing else; 0x1_ covers only the base commit
        assert_eq!(graph.lookup(&oid(0x10, 0), 1), Lookup::Exact(0));
        assert_eq!(graph.lookup(&oid(0x00, 0), 0), Lookup::Ambiguous);
        assert!(graph.contains(&oid(0x30, 0)));
        assert!(!graph.contains(&oid(0x31, 0)));
    }

    #[test]
    fn test_find_errors_carry_prefix() {
        let graph = three_commits();
        let err = graph.find(&oid(0x40, 0), 4).unwrap_err();
        assert!(matches!(err, GraphError::IdNotFound { ref prefix } if prefix == "4000"));
    }

    #[test]
    fn test_ambiguous_short_prefix() {
        let a = oid(0x55, 1);
        let b = oid(0x55, 2);
        let graph = CommitGraph::parse(graph_bytes(vec![
            CommitRecord::new(a, oid(0xee, 0)),
            CommitRecord::new(b, oid(0xee, 0)),
        ]))
        .unwrap();

        let err = graph.find(&a, 8).unwrap_err();
        assert!(err.is_ambiguous());
        // Either id of the pair gives the same answer for the shared prefix
        assert!(graph.find(&b, 8).unwrap_err().is_ambiguous());
        assert_eq!(graph.lookup(&b, 8), Lookup::Ambiguous);
        assert_eq!(graph.find(&a, OID_HEX_SIZE).unwrap().id, a);
        assert_eq!(graph.find(&b, OID_HEX_SIZE).unwrap().id, b);

        // A one-digit prefix with high trailing bits still covers both
        assert_eq!(graph.lookup(&oid(0x5f, 0xff), 1), Lookup::Ambiguous);
        assert_eq!(graph.lookup(&oid(0x55, 0xff), 2), Lookup::Ambiguous);
        assert_eq!(graph.lookup(&oid(0x6f, 0xff), 1), Lookup::NotFound);
    }

    #[test]
    fn test_lookup_ignores_digits_past_prefix() {
        let graph = three_commits();
        assert_eq!(graph.lookup(&oid(0xff, 0xff), 0), Lookup::Ambiguous);
        assert_eq!(graph.lookup(&oid(0x2f, 0xff), 1), Lookup::Exact(1));
        assert_eq!(graph.lookup(&oid(0x3f, 0x01), 1), Lookup::Exact(2));
        assert_eq!(graph.lookup(&oid(0x10, 0xff), 2), Lookup::Exact(0));
        assert_eq!(graph.lookup(&oid(0x10, 0xff), OID_HEX_SIZE), Lookup::NotFound);

        let single = CommitGraph::parse(graph_bytes(vec![CommitRecord::new(
            oid(0x80, 0),
            oid(0xee, 0),
        )]))
        .unwrap();
        assert_eq!(single.lookup(&oid(0x7f, 0xff), 0), Lookup::Exact(0));
        assert_eq!(single.lookup(&ObjectId::ZERO, 0), Lookup::Exact(0));
    }

    #[test]
    fn test_octopus_uses_extra_edges() {
        let root_a = oid(0x01, 0);
        let root_b = oid(0x02, 0);
        let root_c = oid(0x03, 0);
        let octopus = oid(0x04, 0);
        let graph = CommitGraph::parse(graph_bytes(vec![
            CommitRecord::new(root_a, oid(0xf0, 0)).with_generation(1),
            CommitRecord::new(root_b, oid(0xf0, 0)).with_generation(1),
            CommitRecord::new(root_c, oid(0xf0, 0)).with_generation(1),
            CommitRecord::new(octopus, oid(0xf0, 0))
                .with_parents(vec![root_b, root_c, root_a])
                .with_generation(2),
        ]))
        .unwrap();

        let entry = graph.find(&octopus, OID_HEX_SIZE).unwrap();
        assert_eq!(entry.parent_count, 3);
        assert_eq!(entry.extra_parents_start, Some(0));
        assert_eq!(graph.num_extra_edges(), 2);

        let parents: Vec<ObjectId> = graph
            .parents(&entry)
            .map(|p| p.unwrap().id)
            .collect();
        assert_eq!(parents, vec![root_b, root_c, root_a]);

        // Third parent is read from the list, not an inline slot
        assert_eq!(graph.parent_index(&entry, 2).unwrap(), 0);
        assert_eq!(graph.extra_edge(1).unwrap(), EXTRA_EDGE_FLAG);
        graph.verify().unwrap();
    }

    #[test]
    fn test_checksum_mismatch_is_integrity_error() {
        let mut bytes = three_commits().into_inner();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let err = CommitGraph::parse(bytes).unwrap_err();
        assert!(err.is_integrity_error());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unterminated_edge_run() {
        let mut bytes = graph_bytes(vec![
            CommitRecord::new(oid(0x01, 0), oid(0xf0, 0)),
            CommitRecord::new(oid(0x02, 0), oid(0xf0, 0)),
            CommitRecord::new(oid(0x03, 0), oid(0xf0, 0)),
            CommitRecord::new(oid(0x04, 0), oid(0xf0, 0))
                .with_parents(vec![oid(0x01, 0), oid(0x02, 0), oid(0x03, 0)]),
        ]);
        let graph = CommitGraph::parse(bytes.clone()).unwrap();
        let edges = graph.layout().extra_edges.clone();
        // Clear the last-entry marker on the final edge
        bytes[edges.end - 4] &= 0x7f;
        reseal(&mut bytes);

        let graph = CommitGraph::parse(bytes).unwrap();
        assert!(matches!(
            graph.entry_at(3),
            Err(GraphError::UnterminatedEdges { start: 0 })
        ));
        assert!(graph.verify().is_err());
    }

    #[test]
    fn test_edge_start_out_of_range_is_not_found() {
        let mut bytes = graph_bytes(vec![
            CommitRecord::new(oid(0x01, 0), oid(0xf0, 0)),
            CommitRecord::new(oid(0x02, 0), oid(0xf0, 0))
                .with_parents(vec![oid(0x01, 0)]),
        ]);
        let graph = CommitGraph::parse(bytes.clone()).unwrap();
        let record = graph.layout().commit_data.start + crate::chunk::COMMIT_DATA_SIZE;
        let slot = record + OID_RAW_SIZE + 4;
        bytes[slot..slot + 4].copy_from_slice(&(EXTRA_EDGE_FLAG | 7).to_be_bytes());
        reseal(&mut bytes);

        let graph = CommitGraph::parse(bytes).unwrap();
        let err = graph.entry_at(1).unwrap_err();
        assert!(matches!(err, GraphError::EdgeNotFound { index: 7, count: 0 }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_verify_catches_bad_parent_and_generation() {
        let builder = {
            let mut builder = CommitGraphBuilder::new();
            builder.add_commit(CommitRecord::new(oid(0x01, 0), oid(0xf0, 0)).with_generation(5));
            builder.add_commit(
                CommitRecord::new(oid(0x02, 0), oid(0xf0, 0))
                    .with_parents(vec![oid(0x01, 0)])
                    .with_generation(5),
            );
            builder
        };
        let graph = CommitGraph::parse(builder.build().unwrap()).unwrap();
        assert!(matches!(
            graph.verify(),
            Err(GraphError::GenerationOrder {
                index: 1,
                parent: 0,
                ..
            })
        ));

        let mut bytes = graph.into_inner();
        let slot = {
            let graph = CommitGraph::parse(bytes.clone()).unwrap();
            graph.layout().commit_data.start + crate::chunk::COMMIT_DATA_SIZE + OID_RAW_SIZE
        };
        bytes[slot..slot + 4].copy_from_slice(&9u32.to_be_bytes());
        reseal(&mut bytes);
        let graph = CommitGraph::parse(bytes).unwrap();
        assert!(matches!(
            graph.verify(),
            Err(GraphError::InvalidParent {
                index: 1,
                parent: 9
            })
        ));
    }

    #[test]
    fn test_fanout_last_equals_commit_count() {
        let graph = three_commits();
        let mut previous = 0;
        for bucket in 0..=255u8 {
            let value = graph.fanout_at(bucket).unwrap();
            assert!(value >= previous);
            previous = value;
        }
        assert_eq!(previous, graph.len());
    }
}
