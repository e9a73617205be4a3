//! Binary search over packed, sorted object id tables
//!
//! Commit-graph and pack index files store their ids as a contiguous run of
//! 20-byte values sorted in ascending byte order. These helpers search such a
//! table in place without materialising `ObjectId` values.

use crate::oid::{OID_RAW_SIZE, ObjectId};
use std::cmp::Ordering;

/// Number of ids stored in a packed table
pub fn table_len(table: &[u8]) -> usize {
    table.len() / OID_RAW_SIZE
}

/// Id at `index` of a packed table, if present
pub fn id_at(table: &[u8], index: usize) -> Option<ObjectId> {
    let start = index.checked_mul(OID_RAW_SIZE)?;
    let end = start.checked_add(OID_RAW_SIZE)?;
    table
        .get(start..end)
        .and_then(|raw| ObjectId::from_slice(raw).ok())
}

/// Search `table[lo..hi]` for `key`.
///
/// Returns `Ok(index)` on an exact match, otherwise `Err(index)` where
/// `index` is the position at which `key` would be inserted. Both are
/// indices into the whole table, not into the searched range. `hi` is
/// clamped to the table length and `lo` to `hi`.
pub fn search(table: &[u8], lo: usize, hi: usize, key: &ObjectId) -> Result<usize, usize> {
    let mut hi = hi.min(table_len(table));
    let mut lo = lo.min(hi);

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let start = mid * OID_RAW_SIZE;
        match table[start..start + OID_RAW_SIZE].cmp(key.as_bytes().as_slice()) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Ok(mid),
        }
    }

    Err(lo)
}
