//! Chunk grid addressing, selection copies and the chunk codec
//!
//! A dataset of extent `dims` is tiled by chunks of extent `chunk`. Edge
//! chunks are stored full size; the part outside the dataset is padding.

use omx_core::{CompressionLevel, OmxError, Result};

use super::space::Hyperslab;

/// Tiling of a dataset extent by fixed-size chunks
#[derive(Debug, Clone)]
pub(crate) struct ChunkGrid {
    dims: Vec<u64>,
    chunk: Vec<u64>,
}

impl ChunkGrid {
    pub(crate) fn new(dims: &[u64], chunk: &[u64]) -> Self {
        Self {
            dims: dims.to_vec(),
            chunk: chunk.to_vec(),
        }
    }

    /// Number of chunks along each dimension
    pub(crate) fn grid_dims(&self) -> Vec<u64> {
        self.dims
            .iter()
            .zip(&self.chunk)
            .map(|(&dim, &chunk)| dim.div_ceil(chunk))
            .collect()
    }

    /// Elements in one (full size) chunk
    pub(crate) fn chunk_elements(&self) -> u64 {
        self.chunk.iter().product()
    }

    /// Row-major linear index of the chunk at grid coordinates `coords`
    pub(crate) fn linear_index(&self, coords: &[u64]) -> u64 {
        self.grid_dims()
            .iter()
            .zip(coords)
            .fold(0, |index, (&extent, &coord)| index * extent + coord)
    }

    /// Grid coordinates of every chunk intersecting `slab`, row-major
    pub(crate) fn chunks_for(&self, slab: &Hyperslab) -> Vec<Vec<u64>> {
        if slab.is_empty() {
            return Vec::new();
        }

        let first: Vec<u64> = slab
            .start
            .iter()
            .zip(&self.chunk)
            .map(|(&start, &chunk)| start / chunk)
            .collect();
        let last: Vec<u64> = slab
            .start
            .iter()
            .zip(&slab.count)
            .zip(&self.chunk)
            .map(|((&start, &count), &chunk)| (start + count - 1) / chunk)
            .collect();

        let mut out = Vec::new();
        let mut coords = first.clone();
        loop {
            out.push(coords.clone());
            if !advance(&mut coords, &first, &last) {
                break;
            }
        }
        out
    }

    /// Visit every contiguous run shared by chunk `coords` and `slab`
    ///
    /// The callback receives `(chunk_offset, selection_offset, len)` in
    /// bytes, relative to the chunk buffer and to a row-major buffer
    /// holding exactly the selected elements.
    pub(crate) fn for_each_run<F>(&self, coords: &[u64], slab: &Hyperslab, element_size: usize, mut f: F)
    where
        F: FnMut(usize, usize, usize),
    {
        let rank = self.dims.len();
        let origin: Vec<u64> = coords.iter().zip(&self.chunk).map(|(&c, &n)| c * n).collect();

        let mut lo = Vec::with_capacity(rank);
        let mut hi = Vec::with_capacity(rank);
        for d in 0..rank {
            let start = slab.start[d].max(origin[d]);
            let end = (slab.start[d] + slab.count[d]).min(origin[d] + self.chunk[d]);
            if start >= end {
                return;
            }
            lo.push(start);
            hi.push(end - 1);
        }

        let chunk_strides = strides(&self.chunk);
        let slab_strides = strides(&slab.count);
        let run = ((hi[rank - 1] - lo[rank - 1] + 1) as usize) * element_size;

        let mut index = lo.clone();
        loop {
            let mut chunk_offset = 0u64;
            let mut slab_offset = 0u64;
            for d in 0..rank {
                chunk_offset += (index[d] - origin[d]) * chunk_strides[d];
                slab_offset += (index[d] - slab.start[d]) * slab_strides[d];
            }
            f(
                chunk_offset as usize * element_size,
                slab_offset as usize * element_size,
                run,
            );

            // The last dimension is covered by the run itself
            if rank == 1 || !advance(&mut index[..rank - 1], &lo[..rank - 1], &hi[..rank - 1]) {
                break;
            }
        }
    }
}

/// Row-major strides, in elements, for an extent
fn strides(extent: &[u64]) -> Vec<u64> {
    let mut out = vec![1; extent.len()];
    for d in (0..extent.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * extent[d + 1];
    }
    out
}

/// Odometer step over the inclusive box `[first, last]`
fn advance(coords: &mut [u64], first: &[u64], last: &[u64]) -> bool {
    for d in (0..coords.len()).rev() {
        if coords[d] < last[d] {
            coords[d] += 1;
            return true;
        }
        coords[d] = first[d];
    }
    false
}

/// Encode a chunk for storage at the given compression level
pub(crate) fn encode(data: &[u8], compression: CompressionLevel) -> Result<Vec<u8>> {
    if !compression.is_compressed() {
        return Ok(data.to_vec());
    }
    zstd::bulk::compress(data, i32::from(compression.to_u8()))
        .map_err(|e| OmxError::Resource(format!("failed to compress chunk: {e}")))
}

/// Decode a stored chunk
pub(crate) fn decode(stored: &[u8], compression: CompressionLevel) -> Result<Vec<u8>> {
    if !compression.is_compressed() {
        return Ok(stored.to_vec());
    }
    zstd::stream::decode_all(stored)
        .map_err(|e| OmxError::Format(format!("corrupt compressed chunk: {e}")))
}

/// Write-back cache holding one decoded chunk of a dataset
#[derive(Debug)]
pub(crate) struct ChunkCache {
    pub(crate) index: u64,
    pub(crate) data: Vec<u8>,
    pub(crate) dirty: bool,
}
