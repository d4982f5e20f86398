//! Common types and traits shared across the PRNI collation crates.
//!
//! This crate provides the core abstractions that are shared between
//! `prni-core` and the format crates (`prni-shapefile`, `prni-gpkg`),
//! preventing circular dependencies.

pub mod crs;
pub mod dataset;
pub mod geometry;
pub mod io;

// Re-export commonly used types
pub use crs::Crs;
pub use dataset::{Dataset, DatasetError, GEOMETRY_COLUMN};
pub use io::{DatasetReader, DatasetWriter};
