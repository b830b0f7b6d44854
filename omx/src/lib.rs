//! OMX - Open Matrix containers
//!
//! This library stores travel-model style data: square zone-to-zone
//! matrices and zone-indexed reference vectors sharing one zone system,
//! each carrying typed attributes, in a single chunked container file.
//!
//! ## Architecture
//!
//! The workspace keeps definitions and implementation apart:
//!
//! - **omx-core**: logical types, error taxonomy, chunk-shape policy and
//!   on-disk layout definitions (no I/O)
//! - **omx**: the storage engine, attribute and entry collections, and the
//!   container orchestrator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omx::{LogicalType, OmxFile};
//!
//! fn example() -> omx::Result<()> {
//!     let mut file = OmxFile::new("skims.omx");
//!     file.open_with_truncate(3)?;
//!
//!     let matrix = file.add_matrix("time", LogicalType::Float)?;
//!     matrix.write_row_typed(0, &[0.0f32, 4.5, 9.25])?;
//!     matrix.attributes_mut().set_string("units", "minutes")?;
//!
//!     let labels = file.add_zonal_reference("names", LogicalType::String)?;
//!     labels.write_string_reference(&["north", "center", "south"])?;
//!     file.close()?;
//!
//!     let mut file = OmxFile::new("skims.omx");
//!     file.open_read_only()?;
//!     let row: Vec<f32> = file.matrix_mut("time")?.read_row_vec(0)?;
//!     assert_eq!(row[2], 9.25);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed attributes**: eleven scalar and string types, kept in creation order
//! - **Chunked storage**: row-oriented chunk shapes with optional zstd compression
//! - **Memory-mapped reads**: read-only containers are mapped (feature `mmap`)

// Re-export core abstractions and format definitions
pub use omx_core::{
    // Element traits
    OmxElement, ZonalDataset,
    // Format definitions
    ChunkBudget, CompressionLevel, FormatVersion, LogicalType,
    // Error handling
    ErrorKind, OmxError, Result,
};

// Implementation modules
pub mod attributes;
pub mod collection;
pub mod config;
pub mod file;
pub mod matrix;
pub mod registry;
pub mod store;
pub mod zonal;

// Public exports
pub use attributes::{AttributeCollection, AttributeType, AttributeValue};
pub use collection::{EntryKind, NamedCollection};
pub use config::ContainerConfig;
pub use file::OmxFile;
pub use matrix::Matrix;
pub use zonal::ZonalReference;
