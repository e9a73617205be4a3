//! Error types for object identifier handling

use thiserror::Error;

/// Errors that can occur when constructing or parsing object identifiers
#[derive(Debug, Error)]
pub enum OidError {
    /// Raw id has the wrong number of bytes
    #[error("Invalid object id length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Hex string could not be decoded
    #[error("Invalid object id hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A single hex digit in an abbreviated id is not valid
    #[error("Invalid hex digit {0:?} in object id prefix")]
    InvalidHexDigit(char),

    /// Abbreviated id has no digits
    #[error("Empty object id prefix")]
    EmptyPrefix,

    /// Abbreviated id is longer than a full id
    #[error("Object id prefix too long: {0} hex digits")]
    PrefixTooLong(usize),
}
