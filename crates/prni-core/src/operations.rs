//! Pipeline orchestration.
//!
//! A run processes each configured country independently:
//!
//! 1. locate shapefiles under the country directory
//! 2. read every file
//! 3. drop non-point datasets (points variant only)
//! 4. normalize column names
//! 5. assign the override CRS and reproject to EPSG:4326
//! 6. collate and write `<output_dir>/<code>.gpkg`
//!
//! Per-file errors are collected in the country report, or abort the
//! country, depending on [`FileErrorPolicy`]. A failing country never stops
//! the run.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use prni_core_common::dataset::EXTENSION_NAME_KEY;
use prni_core_common::{Dataset, DatasetReader, DatasetWriter};
use prni_gpkg::{GpkgReader, GpkgWriter};
use prni_shapefile::ShapefileReader;

use crate::collate::collate;
use crate::config::{CollateConfig, FileErrorPolicy};
use crate::countries::CountryCode;
use crate::crs::reconcile_crs;
use crate::error::{CollateError, CollationError, IoError, IoErrorExt, Result};
use crate::filter::{first_geometry_type, retain_point_datasets};
use crate::locator::locate_shapefiles;
use crate::normalize::{detect_depth_column, normalize_schema};
use crate::types::{
    CountryOutput, CountryReport, DatasetInfo, FieldInfo, FileFailure, GeometryColumnInfo,
    RunSummary, SkippedFile,
};

/// Per-file bookkeeping while a country is processed.
#[derive(Default)]
struct Progress {
    files_found: usize,
    files_collated: usize,
    skipped: Vec<SkippedFile>,
    failures: Vec<FileFailure>,
}

/// The collation pipeline, generic over its input reader and output writer.
pub struct Pipeline<R, W> {
    config: CollateConfig,
    reader: R,
    writer: W,
}

impl Pipeline<ShapefileReader, GpkgWriter> {
    /// Creates a pipeline reading shapefiles and writing GeoPackages.
    #[must_use]
    pub fn new(config: CollateConfig) -> Self {
        Self::with_io(config, ShapefileReader, GpkgWriter)
    }
}

impl<R: DatasetReader, W: DatasetWriter> Pipeline<R, W> {
    /// Creates a pipeline with a custom reader and writer.
    #[must_use]
    pub fn with_io(config: CollateConfig, reader: R, writer: W) -> Self {
        Self {
            config,
            reader,
            writer,
        }
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &CollateConfig {
        &self.config
    }

    /// Processes every configured country in order.
    #[must_use]
    pub fn run(&self) -> RunSummary {
        info!(
            "Collating {} country(ies), {} variant",
            self.config.countries().len(),
            self.config.variant()
        );
        let reports = self
            .config
            .countries()
            .iter()
            .map(|&country| self.collate_country(country))
            .collect();
        RunSummary { reports }
    }

    /// Processes one country and reports the outcome.
    #[must_use]
    pub fn collate_country(&self, country: CountryCode) -> CountryReport {
        info!("Processing: {country} ({})", country.name());
        let directory = self.config.country_dir(country);
        let mut progress = Progress::default();
        let outcome = self.run_stages(country, &directory, &mut progress);

        match &outcome {
            Ok(output) => info!(
                "{country}: wrote {} feature(s) to {}",
                output.features,
                output.path.display()
            ),
            Err(e) => error!("{country}: {e}"),
        }

        CountryReport {
            country,
            directory,
            files_found: progress.files_found,
            files_collated: progress.files_collated,
            skipped: progress.skipped,
            failures: progress.failures,
            outcome,
        }
    }

    fn run_stages(
        &self,
        country: CountryCode,
        directory: &Path,
        progress: &mut Progress,
    ) -> Result<CountryOutput> {
        let files = locate_shapefiles(directory)?;
        progress.files_found = files.len();
        if files.is_empty() {
            return Err(CollationError::NoInputFiles {
                country,
                directory: directory.to_path_buf(),
            }
            .into());
        }
        info!("{country}: found {} shapefile(s)", files.len());

        let mut datasets = Vec::with_capacity(files.len());
        for path in files {
            match self
                .reader
                .read_dataset(&path)
                .with_read_context(self.reader.format_name(), &path)
            {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => self.record_failure(progress, path, e)?,
            }
        }

        if self.config.variant().filters_points() {
            let filtered = retain_point_datasets(datasets);
            progress
                .skipped
                .extend(filtered.skipped.into_iter().map(|rejected| SkippedFile {
                    path: rejected.dataset.source().to_path_buf(),
                    reason: rejected.check,
                }));
            for (dataset, e) in filtered.failed {
                self.record_failure(progress, dataset.source().to_path_buf(), e)?;
            }
            datasets = filtered.retained;
        }

        let override_epsg = self.config.crs_override(country);
        let mut canonical = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let path = dataset.source().to_path_buf();
            let prepared = normalize_schema(dataset, self.config.depth_prefix())
                .and_then(|(dataset, _)| reconcile_crs(dataset, country, override_epsg));
            match prepared {
                Ok(dataset) => canonical.push(dataset),
                Err(e) => self.record_failure(progress, path, e)?,
            }
        }

        if canonical.is_empty() {
            return Err(CollationError::NothingToCollate {
                country,
                skipped: progress.skipped.len(),
                failed: progress.failures.len(),
            }
            .into());
        }
        progress.files_collated = canonical.len();

        let collated = collate(country, &canonical)?;
        let path = self.config.output_path(country);
        let features = self
            .writer
            .write_dataset(&collated, &path, self.config.layer_name())
            .with_write_context(self.writer.format_name(), &path)?;
        Ok(CountryOutput { path, features })
    }

    fn record_failure(
        &self,
        progress: &mut Progress,
        path: PathBuf,
        error: CollateError,
    ) -> Result<()> {
        match self.config.on_file_error() {
            FileErrorPolicy::Skip => {
                warn!("Skipping {}: {error}", path.display());
                progress.failures.push(FileFailure { path, error });
                Ok(())
            },
            FileErrorPolicy::AbortCountry => Err(error),
        }
    }
}

/// Runs the shapefile-to-GeoPackage pipeline for every configured country.
#[must_use]
pub fn collate_all(config: CollateConfig) -> RunSummary {
    Pipeline::new(config).run()
}

/// Reads a shapefile or GeoPackage and describes its layout.
///
/// `depth_prefix` is used to report which column the normalizer would pick
/// as depth.
///
/// # Errors
///
/// Returns an error if the file does not exist, has an unsupported
/// extension, or cannot be read.
pub fn inspect(path: &Path, depth_prefix: &str) -> Result<DatasetInfo> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let reader: &dyn DatasetReader = match extension.as_deref() {
        Some("shp") => &ShapefileReader,
        Some("gpkg") => &GpkgReader,
        _ => {
            return Err(IoError::InvalidPath {
                path: path.to_path_buf(),
                reason: "expected a .shp or .gpkg file".to_string(),
            }
            .into());
        },
    };

    let dataset = reader
        .read_dataset(path)
        .with_read_context(reader.format_name(), path)?;
    describe(&dataset, reader.format_name(), depth_prefix)
}

fn describe(dataset: &Dataset, driver: &str, depth_prefix: &str) -> Result<DatasetInfo> {
    let schema = dataset.batch().schema();
    let geometry_index = dataset.geometry_index();
    let geometry_field = schema.field(geometry_index);
    let columns = dataset.column_names();

    Ok(DatasetInfo {
        dataset: dataset.source().display().to_string(),
        driver: driver.to_string(),
        feature_count: dataset.num_rows(),
        depth_column: detect_depth_column(&columns, geometry_index, &depth_prefix.to_lowercase()),
        columns,
        geometry_column: GeometryColumnInfo {
            name: geometry_field.name().clone(),
            extension: geometry_field.metadata().get(EXTENSION_NAME_KEY).cloned(),
            crs: dataset.crs().map(ToString::to_string),
            first_geometry: first_geometry_type(dataset)?,
        },
        fields: schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != geometry_index)
            .map(|(_, f)| FieldInfo::from(f.as_ref()))
            .collect(),
    })
}
