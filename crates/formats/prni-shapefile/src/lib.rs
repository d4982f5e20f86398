//! ESRI Shapefile reader producing [`prni_core_common::Dataset`] values.
//!
//! A shapefile is read in one pass: geometries from `.shp`, attributes from
//! `.dbf` (in header order), and the CRS from the optional `.prj` sidecar.
//! Attribute columns come first and the geometry column, named `geometry`,
//! comes last.

mod reader;

pub use reader::{ShapefileError, ShapefileReader, read_shapefile};
