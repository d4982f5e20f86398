//! Minimal OGC GeoPackage support for single-layer feature tables.
//!
//! The writer produces a GeoPackage 1.3 file with the mandatory metadata
//! tables (`gpkg_spatial_ref_sys`, `gpkg_contents`, `gpkg_geometry_columns`)
//! and one feature table. The reader loads a feature table back into a
//! [`prni_core_common::Dataset`].

mod error;
mod reader;
mod writer;

pub use error::GpkgError;
pub use reader::{GpkgReader, read_gpkg};
pub use writer::{GpkgWriter, write_gpkg};

/// `application_id` value identifying a GeoPackage (`"GPKG"` in ASCII).
pub const APPLICATION_ID: i32 = 0x4750_4B47;

/// `user_version` value for GeoPackage 1.3.0.
pub const USER_VERSION: i32 = 10_300;

/// Quotes an SQLite identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
