//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting run summaries, dataset information and the country table.

use tabled::{Table, Tabled};

use prni_core::CollateConfig;
use prni_core::types::{CountryReport, DatasetInfo, RunSummary};

/// Table row representation for one country of a run.
#[derive(Tabled)]
pub struct SummaryRow {
    /// Country code.
    #[tabled(rename = "Country")]
    pub country: String,
    /// `ok`, `partial` or `failed`.
    #[tabled(rename = "Status")]
    pub status: String,
    /// Shapefiles collated out of those found.
    #[tabled(rename = "Files Read")]
    pub files_read: String,
    /// Files dropped by the point filter or failed.
    #[tabled(rename = "Files Skipped")]
    pub files_skipped: usize,
    /// Features in the output file.
    #[tabled(rename = "Features")]
    pub features: String,
    /// Output path, or the reason the country failed.
    #[tabled(rename = "Output")]
    pub output: String,
}

impl From<&CountryReport> for SummaryRow {
    fn from(report: &CountryReport) -> Self {
        let (features, output) = match &report.outcome {
            Ok(out) => (out.features.to_string(), out.path.display().to_string()),
            Err(e) => ("-".to_string(), e.user_message()),
        };
        Self {
            country: report.country.to_string(),
            status: report.status().to_string(),
            files_read: format!("{}/{}", report.files_collated, report.files_found),
            files_skipped: report.skipped.len() + report.failures.len(),
            features,
            output,
        }
    }
}

/// Table row representation for displaying geometry column information.
#[derive(Tabled)]
pub struct GeometryRow {
    /// Name of the geometry column.
    #[tabled(rename = "Column")]
    pub name: String,
    /// `GeoArrow` extension name for the geometry encoding.
    #[tabled(rename = "Extension")]
    pub extension: String,
    /// Coordinate Reference System information.
    #[tabled(rename = "CRS")]
    pub crs: String,
    /// Type of the first geometry.
    #[tabled(rename = "First Geometry")]
    pub first_geometry: String,
}

/// Table row representation for displaying field/column information.
#[derive(Tabled)]
pub struct FieldRow {
    /// Name of the field.
    #[tabled(rename = "Field")]
    pub name: String,
    /// Data type of the field.
    #[tabled(rename = "Type")]
    pub data_type: String,
    /// Whether the field can contain null values.
    #[tabled(rename = "Nullable")]
    pub nullable: String,
}

/// Table row representation for the configured countries.
#[derive(Tabled)]
pub struct CountryRow {
    #[tabled(rename = "Code")]
    pub code: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Input Directory")]
    pub input: String,
    #[tabled(rename = "Output File")]
    pub output: String,
    #[tabled(rename = "CRS Override")]
    pub crs_override: String,
}

/// Display the outcome of a run, one row per country, followed by the
/// per-file problems.
pub fn display_run_summary(summary: &RunSummary) {
    let rows: Vec<SummaryRow> = summary.reports.iter().map(SummaryRow::from).collect();
    println!("{}", Table::new(rows));

    for report in &summary.reports {
        for skipped in &report.skipped {
            println!(
                "  {} skipped {}: first geometry is {}",
                report.country,
                skipped.path.display(),
                skipped.reason
            );
        }
        for failure in &report.failures {
            println!(
                "  {} failed {}: {}",
                report.country,
                failure.path.display(),
                failure.error.user_message()
            );
        }
        if let Err(e) = &report.outcome {
            if let Some(hint) = e.recovery_suggestion() {
                println!("  {}: {hint}", report.country);
            }
        }
    }

    println!(
        "\n{} of {} country(ies) written, {} feature(s) in total",
        summary.succeeded(),
        summary.reports.len(),
        summary.total_features()
    );
}

/// Display dataset information in a formatted table.
///
/// This function presents dataset metadata, the geometry column, the field
/// schema and the depth column detection in a human-readable format written
/// to standard output.
pub fn display_dataset_info(info: &DatasetInfo) {
    println!("\nDataset: {}", info.dataset);
    println!("Driver: {}", info.driver);
    println!("Features: {}", info.feature_count);

    println!("\n=== Geometry Column ===");
    let geometry = &info.geometry_column;
    let geo_rows = vec![GeometryRow {
        name: geometry.name.clone(),
        extension: geometry.extension.clone().unwrap_or_else(|| "N/A".to_string()),
        crs: geometry.crs.clone().unwrap_or_else(|| "N/A".to_string()),
        first_geometry: geometry.first_geometry.to_string(),
    }];
    println!("{}", Table::new(geo_rows));

    if !info.fields.is_empty() {
        println!("\n=== Fields ===");

        let field_rows: Vec<FieldRow> = info
            .fields
            .iter()
            .map(|f| FieldRow {
                name: f.name.clone(),
                data_type: f.data_type.clone(),
                nullable: if f.nullable { "Yes" } else { "No" }.to_string(),
            })
            .collect();
        println!("{}", Table::new(field_rows));
    }

    println!("\nDepth column: {}", info.depth_column_label());
}

/// Display the countries a configuration would process.
pub fn display_countries(config: &CollateConfig) {
    let rows: Vec<CountryRow> = config
        .countries()
        .iter()
        .map(|&country| CountryRow {
            code: country.to_string(),
            name: country.name().to_string(),
            input: config.country_dir(country).display().to_string(),
            output: config.output_path(country).display().to_string(),
            crs_override: config
                .crs_override(country)
                .map_or_else(|| "-".to_string(), |code| format!("EPSG:{code}")),
        })
        .collect();

    println!(
        "\nCountries ({} total, {} variant):\n",
        rows.len(),
        config.variant()
    );
    println!("{}", Table::new(rows));
}
