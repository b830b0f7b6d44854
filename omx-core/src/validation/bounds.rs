//! Row, index and buffer bounds validation
//!
//! Pure checks with overflow protection, no I/O dependencies.

use alloc::format;

use crate::{OmxError, Result};

/// Validate that `row` addresses an existing row of a `zones`-row dataset
pub fn validate_row_index(row: u64, zones: u64) -> Result<()> {
    if row >= zones {
        return Err(OmxError::Range(format!(
            "row index {row} was out of the acceptable range (zones: {zones})"
        )));
    }
    Ok(())
}

/// Validate a positional lookup into a collection of `len` entries
pub fn validate_entry_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(OmxError::IndexOutOfRange(format!(
            "index {index} out of range for {len} entries"
        )));
    }
    Ok(())
}

/// Validate that a caller buffer has exactly the expected length
pub fn validate_buffer_len(actual: usize, expected: usize, what: &str) -> Result<()> {
    if actual != expected {
        return Err(OmxError::SizeMismatch(format!(
            "{what} holds {actual} bytes, expected {expected}"
        )));
    }
    Ok(())
}

/// Safely calculate total byte size from element count
pub fn checked_byte_size(count: u64, element_size: usize) -> Result<usize> {
    usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(element_size))
        .ok_or_else(|| OmxError::Resource("byte size calculation would overflow".into()))
}
