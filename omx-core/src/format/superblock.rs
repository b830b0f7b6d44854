//! Storage engine superblock format
//!
//! The superblock is the fixed-size header at offset zero of every
//! container file. It locates the catalog (the serialized group, dataset
//! and attribute tree) and the end of the data region.

use super::constants::engine::{MAGIC, SUPERBLOCK_SIZE, VERSION};
use crate::{OmxError, Result};

/// Fixed-size superblock for container files (64 bytes, little-endian)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    /// Magic bytes: "OMXH"
    pub magic: [u8; 4],
    /// Engine layout version
    pub version: u8,
    /// Reserved flag bits
    pub flags: u8,
    /// Padding for alignment
    pub _padding: [u8; 2],
    /// Offset of the catalog from file start
    pub catalog_offset: u64,
    /// Size of the catalog in bytes
    pub catalog_size: u64,
    /// First byte past the last allocated blob
    pub data_end: u64,
    /// Reserved space for future extensions
    pub reserved: [u8; 32],
}

impl Superblock {
    /// Size of the superblock in bytes
    pub const SIZE: usize = SUPERBLOCK_SIZE;

    /// Create a superblock for an empty file
    pub const fn new() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            _padding: [0; 2],
            catalog_offset: 0,
            catalog_size: 0,
            data_end: SUPERBLOCK_SIZE as u64,
            reserved: [0; 32],
        }
    }

    /// Get catalog region offset and size
    pub fn catalog_region(&self) -> Option<(u64, u64)> {
        if self.catalog_offset == 0 || self.catalog_size == 0 {
            None
        } else {
            Some((self.catalog_offset, self.catalog_size))
        }
    }

    /// Set catalog region offset and size
    pub fn set_catalog_region(&mut self, offset: u64, size: u64) {
        self.catalog_offset = offset;
        self.catalog_size = size;
    }

    /// Parse superblock from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(OmxError::Format("file too small for a container header".into()));
        }

        if bytes[0..4] != MAGIC {
            return Err(OmxError::Format("not an OMX container (bad magic)".into()));
        }

        let version = bytes[4];
        if version > VERSION {
            return Err(OmxError::Format("unsupported storage engine version".into()));
        }

        let read_u64 = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(word)
        };

        let mut reserved = [0u8; 32];
        reserved.copy_from_slice(&bytes[32..64]);

        let superblock = Self {
            magic: MAGIC,
            version,
            flags: bytes[5],
            _padding: [0; 2],
            catalog_offset: read_u64(8),
            catalog_size: read_u64(16),
            data_end: read_u64(24),
            reserved,
        };

        // The catalog must live inside the allocated region
        if let Some((offset, size)) = superblock.catalog_region() {
            let end = offset
                .checked_add(size)
                .ok_or_else(|| OmxError::Format("catalog region overflows".into()))?;
            if offset < Self::SIZE as u64 || end > superblock.data_end {
                return Err(OmxError::Format("catalog region out of bounds".into()));
            }
        }

        Ok(superblock)
    }

    /// Convert superblock to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes[5] = self.flags;
        // padding bytes remain zero
        bytes[8..16].copy_from_slice(&self.catalog_offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.catalog_size.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.data_end.to_le_bytes());
        bytes[32..64].copy_from_slice(&self.reserved);
        bytes
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self::new()
    }
}
