//! Container format definitions
//!
//! This module contains pure data structure definitions for the OMX
//! container layout. No I/O operations, only format definitions.

pub mod constants;
pub mod superblock;
pub mod types;

pub use superblock::Superblock;
pub use types::{CompressionLevel, FormatVersion, LogicalType};
