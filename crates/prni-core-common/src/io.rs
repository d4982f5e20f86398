//! I/O traits for reading and writing datasets.
//!
//! This module defines the seams that format implementations provide. The
//! collation pipeline only talks to these traits, so tests can substitute
//! in-memory readers and writers.

use anyhow::Result;
use std::path::Path;

use crate::dataset::Dataset;

/// Trait for reading a dataset from a file.
pub trait DatasetReader: Send + Sync {
    /// Short format name used in logs and error messages (e.g., `"ESRI Shapefile"`).
    fn format_name(&self) -> &'static str;

    /// Reads the whole file into memory.
    ///
    /// Implementations must release every file handle before returning,
    /// on success and on failure alike.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decoded.
    fn read_dataset(&self, path: &Path) -> Result<Dataset>;
}

/// Trait for persisting a dataset as a named layer.
pub trait DatasetWriter: Send + Sync {
    /// Short format name used in logs and error messages (e.g., `"GPKG"`).
    fn format_name(&self) -> &'static str;

    /// Writes `dataset` to `path` as layer `layer`, replacing any existing
    /// file at `path`. Returns the number of features written.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be created or written.
    fn write_dataset(&self, dataset: &Dataset, path: &Path, layer: &str) -> Result<usize>;
}
