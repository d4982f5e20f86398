//! `prni-core` collates per-country bathymetry shapefiles into one
//! GeoPackage per country.
//!
//! This crate includes:
//! - **Configuration**: [`CollateOptions`] and the validated [`CollateConfig`].
//! - **Stages**: file location, point filtering, schema normalization, CRS
//!   reconciliation and collation, each a plain function.
//! - **Pipeline**: [`operations::Pipeline`] runs the stages per country and
//!   returns a [`types::RunSummary`].

pub mod collate;
pub mod config;
pub mod countries;
pub mod crs;
pub mod error;
pub mod filter;
pub mod locator;
pub mod normalize;
pub mod operations;
pub mod types;

pub use config::{CollateConfig, CollateOptions, FileErrorPolicy, Variant};
pub use countries::CountryCode;
pub use error::{CollateError, Result};
pub use operations::{Pipeline, collate_all, inspect};
pub use prni_core_common::{Crs, Dataset, DatasetReader, DatasetWriter};
