//! Chunk-shape policy for newly created datasets
//!
//! Matrices are chunked along rows so a row read touches as few chunks as
//! possible; zonal references are chunked along their single dimension.
//! The budget is a target chunk size in bytes. Compressed datasets get a
//! larger budget since compression amortizes better over bigger tiles.

use crate::format::constants::{
    IDEAL_CHUNK_SIZE_NO_COMPRESSION, IDEAL_CHUNK_SIZE_WITH_COMPRESSION,
};
use crate::format::CompressionLevel;

/// Target chunk sizes in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkBudget {
    /// Budget used when the dataset is stored uncompressed
    pub uncompressed: usize,
    /// Budget used when any compression level is applied
    pub compressed: usize,
}

impl ChunkBudget {
    pub const DEFAULT: ChunkBudget = ChunkBudget {
        uncompressed: IDEAL_CHUNK_SIZE_NO_COMPRESSION,
        compressed: IDEAL_CHUNK_SIZE_WITH_COMPRESSION,
    };

    /// Budget in bytes for the given compression level
    pub const fn for_level(&self, compression: CompressionLevel) -> usize {
        if compression.is_compressed() {
            self.compressed
        } else {
            self.uncompressed
        }
    }

    /// Chunk shape `[rows, columns]` for a square `zones` x `zones` matrix
    pub fn matrix_chunk(&self, zones: u64, element_size: usize, compression: CompressionLevel) -> [u64; 2] {
        chunk_shape_2d(zones, element_size, self.for_level(compression))
    }

    /// Chunk shape `[elements]` for a zonal reference of length `zones`
    pub fn reference_chunk(&self, zones: u64, element_size: usize, compression: CompressionLevel) -> [u64; 1] {
        [chunk_shape_1d(zones, element_size, self.for_level(compression))]
    }
}

impl Default for ChunkBudget {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compute the 2-D chunk shape for a square matrix
///
/// - a row that exactly fills the budget gets one row per chunk
/// - a row smaller than the budget gets as many whole rows as fit, capped at `zones`
/// - a row larger than the budget is split into budget-sized column runs
///
/// Every dimension is at least 1, including for an empty matrix.
pub fn chunk_shape_2d(zones: u64, element_size: usize, budget: usize) -> [u64; 2] {
    let element_size = element_size.max(1) as u64;
    let budget = budget as u64;
    let max_fit = budget / element_size;

    let shape = if zones == max_fit {
        [1, zones]
    } else if zones < max_fit {
        let rows = budget / (element_size * zones.max(1));
        [rows.min(zones), zones]
    } else {
        [1, max_fit]
    };

    [shape[0].max(1), shape[1].max(1)]
}

/// Compute the 1-D chunk length for a zonal reference
pub fn chunk_shape_1d(zones: u64, element_size: usize, budget: usize) -> u64 {
    let element_size = element_size.max(1) as u64;
    zones.min(budget as u64 / element_size).max(1)
}
