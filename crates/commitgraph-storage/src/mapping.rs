//! Backing bytes for an opened commit-graph

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::Read;

/// Immutable bytes of a commit-graph file, mapped or read into memory
#[derive(Debug)]
pub enum GraphBytes {
    /// Read-only memory mapping of the file
    Mapped(Mmap),
    /// File contents read into a buffer
    Owned(Vec<u8>),
}

impl GraphBytes {
    /// Memory-map `file` read-only.
    ///
    /// Empty files are not mapped.
    pub fn map(file: &File) -> std::io::Result<Self> {
        if file.metadata()?.len() == 0 {
            return Ok(Self::Owned(Vec::new()));
        }

        // SAFETY: mapped read-only; writers replace the file by rename
        // rather than truncating it in place
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(file)? };
        Ok(Self::Mapped(mmap))
    }

    /// Read the whole of `file` into memory
    pub fn read(mut file: &File, size_hint: u64) -> std::io::Result<Self> {
        let mut data = Vec::with_capacity(usize::try_from(size_hint).unwrap_or(0));
        file.read_to_end(&mut data)?;
        Ok(Self::Owned(data))
    }

    /// Whether the bytes come from a memory mapping
    pub const fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    /// Whether there are no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for GraphBytes {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => mmap,
            Self::Owned(data) => data,
        }
    }
}
