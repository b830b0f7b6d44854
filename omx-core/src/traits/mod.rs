//! Abstract interfaces for the OMX container
//!
//! This module defines the trait abstractions shared by the container
//! implementation. Traits are pure interfaces, no I/O.

pub mod dataset;
pub mod element;

pub use dataset::ZonalDataset;
pub use element::OmxElement;
