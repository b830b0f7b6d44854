//! Zone-addressed dataset trait
//!
//! This module defines the common read-only surface shared by matrices
//! and zonal references, which the named entry collection relies on.

use crate::format::{CompressionLevel, LogicalType};

/// Common accessors for datasets addressed by zone
pub trait ZonalDataset {
    /// Name of the entry, unique within its kind
    fn name(&self) -> &str;

    /// Element type, fixed at creation
    fn data_type(&self) -> LogicalType;

    /// Zone count captured when the entry was created or opened
    fn zones(&self) -> u64;

    /// Compression applied to the entry's chunks
    fn compression_level(&self) -> CompressionLevel;

    /// Bytes needed for one row (matrices) or the whole vector (references)
    ///
    /// Zero when the element type has no fixed size.
    fn data_size(&self) -> usize {
        self.data_type()
            .fixed_size()
            .map(|size| size * self.zones() as usize)
            .unwrap_or(0)
    }
}
