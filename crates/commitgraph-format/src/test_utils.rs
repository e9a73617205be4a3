//! Test utilities for building and corrupting commit-graphs
//!
//! Shared by the unit test modules so each one does not hand-assemble
//! fixture ids and files.

use crate::{CommitGraphBuilder, CommitRecord};
use commitgraph_oid::{OID_RAW_SIZE, ObjectId};

/// Id with the given first and last byte, zero elsewhere
pub fn oid(first: u8, last: u8) -> ObjectId {
    let mut bytes = [0u8; OID_RAW_SIZE];
    bytes[0] = first;
    bytes[OID_RAW_SIZE - 1] = last;
    ObjectId::from_bytes(bytes)
}

/// Serialise `records` into a complete commit-graph file
pub fn graph_bytes(records: Vec<CommitRecord>) -> Vec<u8> {
    let mut builder = CommitGraphBuilder::new();
    for record in records {
        builder.add_commit(record);
    }
    builder.build().expect("Failed to build commit-graph")
}

/// Recompute the trailer checksum after patching bytes in place
pub fn reseal(bytes: &mut [u8]) {
    let trailer = bytes.len() - OID_RAW_SIZE;
    let checksum = ObjectId::from_data(&bytes[..trailer]);
    bytes[trailer..].copy_from_slice(checksum.as_bytes());
}
