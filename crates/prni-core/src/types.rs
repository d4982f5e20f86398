//! Report types produced by the pipeline and by dataset inspection.

use std::path::PathBuf;

use arrow::datatypes::{DataType, Field};
use prni_core_common::dataset::{EXTENSION_NAME_KEY, WKB_EXTENSION};

use crate::countries::CountryCode;
use crate::error::CollateError;
use crate::filter::GeometryCheck;
use crate::normalize::DepthColumn;

/// Information about a dataset, as shown by `prni info`.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    /// Path to the dataset
    pub dataset: String,
    /// Reader format name
    pub driver: String,
    /// Number of features
    pub feature_count: usize,
    /// All column names in source order, geometry included
    pub columns: Vec<String>,
    /// Geometry column information
    pub geometry_column: GeometryColumnInfo,
    /// Attribute fields
    pub fields: Vec<FieldInfo>,
    /// How the depth column would be identified
    pub depth_column: DepthColumn,
}

impl DatasetInfo {
    /// Describes the depth column detection result.
    #[must_use]
    pub fn depth_column_label(&self) -> String {
        match &self.depth_column {
            DepthColumn::Found(name) => format!("{name} (name match)"),
            DepthColumn::FallbackUsed(index) => format!(
                "{} (positional fallback, column {index})",
                self.columns.get(*index).map_or("?", String::as_str)
            ),
            DepthColumn::NotFound => "not found".to_string(),
        }
    }
}

/// Information about the geometry column.
#[derive(Debug, Clone)]
pub struct GeometryColumnInfo {
    /// Column name
    pub name: String,
    /// Extension name (e.g., "geoarrow.wkb")
    pub extension: Option<String>,
    /// CRS, if declared
    pub crs: Option<String>,
    /// Type of the first geometry
    pub first_geometry: GeometryCheck,
}

/// Information about an attribute field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Data type label
    pub data_type: String,
    /// Whether the field is nullable
    pub nullable: bool,
}

impl From<&Field> for FieldInfo {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name().clone(),
            data_type: type_label(field),
            nullable: field.is_nullable(),
        }
    }
}

fn type_label(field: &Field) -> String {
    if field.metadata().get(EXTENSION_NAME_KEY).map(String::as_str) == Some(WKB_EXTENSION) {
        return "Geometry (WKB)".to_string();
    }
    match field.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => "String".to_string(),
        DataType::Float64 => "Real".to_string(),
        DataType::Int32 | DataType::Int64 => "Integer".to_string(),
        DataType::Boolean => "Boolean".to_string(),
        DataType::Date32 | DataType::Date64 => "Date".to_string(),
        other => format!("{other:?}"),
    }
}

/// A file dropped by the point filter.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    /// The file
    pub path: PathBuf,
    /// Its first geometry
    pub reason: GeometryCheck,
}

/// A file that failed to load or normalize.
#[derive(Debug)]
pub struct FileFailure {
    /// The file
    pub path: PathBuf,
    /// What went wrong
    pub error: CollateError,
}

/// A written output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryOutput {
    /// Output path
    pub path: PathBuf,
    /// Number of features written
    pub features: usize,
}

/// Result of processing one country.
#[derive(Debug)]
pub struct CountryReport {
    /// The country
    pub country: CountryCode,
    /// Directory searched for shapefiles
    pub directory: PathBuf,
    /// Shapefiles located
    pub files_found: usize,
    /// Files that made it into the output
    pub files_collated: usize,
    /// Files dropped by the point filter
    pub skipped: Vec<SkippedFile>,
    /// Files that failed and were skipped
    pub failures: Vec<FileFailure>,
    /// The written output, or why the country failed
    pub outcome: Result<CountryOutput, CollateError>,
}

impl CountryReport {
    /// Whether an output file was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Short status label.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match (&self.outcome, self.failures.is_empty()) {
            (Ok(_), true) => "ok",
            (Ok(_), false) => "partial",
            (Err(_), _) => "failed",
        }
    }
}

/// Reports for every country of a run, in processing order.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Per-country reports
    pub reports: Vec<CountryReport>,
}

impl RunSummary {
    /// Whether any country failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| !r.is_success())
    }

    /// Number of countries with an output file.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    /// Total features written across all countries.
    #[must_use]
    pub fn total_features(&self) -> usize {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(|o| o.features)
            .sum()
    }
}
