#![cfg_attr(not(test), no_std)]

//! OMX Core - Open Matrix container format definitions
//!
//! This crate provides the pure, I/O free part of an OMX container: the
//! logical type set, the persisted layout constants and superblock, the
//! error taxonomy, the chunk-shape policy and the element traits shared by
//! matrices and zonal references.

extern crate alloc;

pub mod chunking;
pub mod error;
pub mod format;
pub mod traits;
pub mod validation;

pub use chunking::*;
pub use error::*;
pub use format::*;
pub use traits::*;
