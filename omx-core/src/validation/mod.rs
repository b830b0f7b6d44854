//! Validation utilities for the OMX container
//!
//! This module contains pure validation functions with no I/O dependencies.

pub mod bounds;
pub mod names;

pub use bounds::{checked_byte_size, validate_buffer_len, validate_entry_index, validate_row_index};
pub use names::{is_valid_dataset_name, validate_dataset_name};
