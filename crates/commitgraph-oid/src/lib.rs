//! Object identifiers for commit-graph files
//!
//! This crate provides the hashing primitives shared by the commit-graph
//! reader and writer:
//!
//! - **`ObjectId`**: 20-byte SHA-1 commit and tree identifiers
//! - **Abbreviated ids**: hex prefixes compared at nibble granularity
//! - **Trailer checksums**: SHA-1 over a file's leading bytes
//! - **Sorted lookup**: binary search over packed id tables
//!
//! # Examples
//!
//! ```
//! use commitgraph_oid::ObjectId;
//!
//! let id = ObjectId::from_data(b"hello");
//! let (prefix, len) = ObjectId::from_hex_prefix(&id.to_hex()[..7]).unwrap();
//! assert!(id.prefix_matches(&prefix, len));
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod lookup;
pub mod oid;

pub use error::OidError;
pub use oid::{OID_HEX_SIZE, OID_RAW_SIZE, ObjectId};
