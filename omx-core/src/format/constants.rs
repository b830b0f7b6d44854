//! Persisted layout constants for OMX containers

use super::types::LogicalType;

/// Group holding every matrix dataset
pub const MATRICES_PATH: &str = "/matrices";

/// Group holding every zonal reference dataset
pub const ZONAL_REFERENCES_PATH: &str = "/zonalReferences";

/// Root attribute holding the format version string
pub const VERSION_ATTRIBUTE: &str = "OMX_VERSION";

/// Root attribute holding the zone count (UInt64)
pub const ZONES_ATTRIBUTE: &str = "OMX_ZONES";

/// Element type used when a matrix is added without an explicit type
pub const DEFAULT_MATRIX_TYPE: LogicalType = LogicalType::Double;

/// Ideal chunk size in bytes for uncompressed datasets
pub const IDEAL_CHUNK_SIZE_NO_COMPRESSION: usize = 256_000;

/// Ideal chunk size in bytes for compressed datasets
pub const IDEAL_CHUNK_SIZE_WITH_COMPRESSION: usize = 320_000;

/// Storage engine constants
pub mod engine {
    /// Magic bytes at the start of every container file
    pub const MAGIC: [u8; 4] = *b"OMXH";

    /// Current engine layout version
    pub const VERSION: u8 = 1;

    /// Fixed size of the superblock
    pub const SUPERBLOCK_SIZE: usize = 64;

    /// Path of the root group
    pub const ROOT_PATH: &str = "/";
}
