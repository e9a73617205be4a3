//! Bounds-checked reads over an immutable byte region
//!
//! Commit-graph files are usually memory-mapped and may be truncated or
//! hostile, so every multi-byte read checks its range and reports
//! [`GraphError::OutOfBounds`] rather than panicking.

use crate::error::{GraphError, GraphResult};
use commitgraph_oid::{OID_RAW_SIZE, ObjectId};
use std::ops::Range;

/// Read-only view over a byte region
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    /// Wrap a byte slice
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Length of the region
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the region is empty
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Underlying bytes
    pub const fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// `len` bytes starting at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> GraphResult<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(GraphError::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            })
    }

    /// Sub-view covering `range`
    pub fn sub(&self, range: &Range<usize>) -> GraphResult<Self> {
        let len = range.end.saturating_sub(range.start);
        self.slice(range.start, len).map(Self::new)
    }

    /// Big-endian `u32` at `offset`
    pub fn u32_be(&self, offset: usize) -> GraphResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.slice(offset, 4)?);
        Ok(u32::from_be_bytes(raw))
    }

    /// Big-endian `u64` at `offset`
    pub fn u64_be(&self, offset: usize) -> GraphResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.slice(offset, 8)?);
        Ok(u64::from_be_bytes(raw))
    }

    /// Object id at `offset`
    pub fn oid(&self, offset: usize) -> GraphResult<ObjectId> {
        Ok(ObjectId::from_slice(self.slice(offset, OID_RAW_SIZE)?)?)
    }
}
