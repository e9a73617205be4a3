//! SHA-1 object identifiers

use crate::error::OidError;
use binrw::{BinRead, BinWrite};
use sha1::{Digest, Sha1};
use std::fmt;

/// Size of a raw object id in bytes
pub const OID_RAW_SIZE: usize = 20;

/// Size of an object id in hex digits
pub const OID_HEX_SIZE: usize = OID_RAW_SIZE * 2;

/// Object identifier (SHA-1 hash) of a commit or tree
#[derive(BinRead, BinWrite, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId([u8; OID_RAW_SIZE]);

impl ObjectId {
    /// The all-zero id
    pub const ZERO: Self = Self([0u8; OID_RAW_SIZE]);

    /// Create object id from raw bytes
    pub const fn from_bytes(bytes: [u8; OID_RAW_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create object id from a slice that must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, OidError> {
        let raw: [u8; OID_RAW_SIZE] = bytes.try_into().map_err(|_| OidError::InvalidLength {
            expected: OID_RAW_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    /// Create object id by computing the SHA-1 of `data`
    pub fn from_data(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut bytes = [0u8; OID_RAW_SIZE];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }

    /// Parse a full 40-digit hex id
    pub fn from_hex(hex: &str) -> Result<Self, OidError> {
        let mut bytes = [0u8; OID_RAW_SIZE];
        hex::decode_to_slice(hex, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Parse an abbreviated hex id.
    ///
    /// Returns the id padded with zero bits and the number of hex digits
    /// that were supplied, which is the length to pass to
    /// [`ObjectId::prefix_matches`].
    pub fn from_hex_prefix(hex: &str) -> Result<(Self, usize), OidError> {
        let len = hex.len();
        if len == 0 {
            return Err(OidError::EmptyPrefix);
        }
        if len > OID_HEX_SIZE {
            return Err(OidError::PrefixTooLong(len));
        }
        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(OidError::InvalidHexDigit(bad));
        }

        let mut bytes = [0u8; OID_RAW_SIZE];
        let even = len & !1;
        hex::decode_to_slice(&hex[..even], &mut bytes[..even / 2])?;
        if len % 2 == 1 {
            let digit = hex[even..].chars().next().unwrap_or('\0');
            let nibble = digit
                .to_digit(16)
                .ok_or(OidError::InvalidHexDigit(digit))?;
            bytes[even / 2] = (nibble as u8) << 4;
        }

        Ok((Self(bytes), len))
    }

    /// Get raw bytes
    pub const fn as_bytes(&self) -> &[u8; OID_RAW_SIZE] {
        &self.0
    }

    /// First byte, used to select a fanout bucket
    pub const fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Compare the first `hex_len` hex digits of two ids.
    ///
    /// A length of [`OID_HEX_SIZE`] or more compares the whole id.
    pub fn prefix_matches(&self, other: &Self, hex_len: usize) -> bool {
        let hex_len = hex_len.min(OID_HEX_SIZE);
        let whole = hex_len / 2;
        if self.0[..whole] != other.0[..whole] {
            return false;
        }
        if hex_len % 2 == 1 {
            return (self.0[whole] ^ other.0[whole]) & 0xf0 == 0;
        }
        true
    }

    /// Copy of this id with every hex digit from `hex_len` on cleared.
    ///
    /// The result sorts at or before every id sharing the first `hex_len`
    /// digits, which makes it the search key for an abbreviated lookup.
    pub fn masked(&self, hex_len: usize) -> Self {
        if hex_len >= OID_HEX_SIZE {
            return *self;
        }
        let whole = hex_len / 2;
        let mut bytes = [0u8; OID_RAW_SIZE];
        bytes[..whole].copy_from_slice(&self.0[..whole]);
        if hex_len % 2 == 1 {
            bytes[whole] = self.0[whole] & 0xf0;
        }
        Self(bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl From<[u8; OID_RAW_SIZE]> for ObjectId {
    fn from(bytes: [u8; OID_RAW_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ObjectId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
