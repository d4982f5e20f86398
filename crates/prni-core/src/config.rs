//! Run configuration.
//!
//! [`CollateOptions`] is the partial, deserializable form: every field is
//! optional so a JSON file and command-line flags can each supply a subset and
//! be merged. [`CollateOptions::build`] validates the result and fills in
//! defaults, producing an immutable [`CollateConfig`] that is passed to the
//! pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::countries::CountryCode;
use crate::error::{ConfigError, IoError, Result};

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "data";
/// Default name of the single output layer.
pub const DEFAULT_LAYER_NAME: &str = "prni";
/// Default per-country input subdirectory.
pub const DEFAULT_INPUT_SUBDIR: &str = "Bathy_shp";

/// Which variant of the pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Keep only point datasets and apply the CRS override table.
    #[default]
    Points,
    /// Keep every geometry type and trust each dataset's declared CRS.
    AllGeometries,
}

impl Variant {
    /// Depth column prefix used when none is configured.
    #[must_use]
    pub const fn default_depth_prefix(self) -> &'static str {
        match self {
            Self::Points => "dep",
            Self::AllGeometries => "dept",
        }
    }

    /// Whether the point geometry filter runs.
    #[must_use]
    pub const fn filters_points(self) -> bool {
        matches!(self, Self::Points)
    }

    /// Whether the CRS override table is applied.
    #[must_use]
    pub const fn applies_overrides(self) -> bool {
        matches!(self, Self::Points)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Points => "points",
            Self::AllGeometries => "all-geometries",
        })
    }
}

/// What to do when a single file fails to load or normalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileErrorPolicy {
    /// Report the file and continue with the rest of the country.
    #[default]
    Skip,
    /// Stop processing the country at the first failing file.
    AbortCountry,
}

/// The CRS override table used when none is configured.
#[must_use]
pub fn default_override_table() -> BTreeMap<CountryCode, u16> {
    BTreeMap::from([
        (CountryCode::Fiji, 3460),
        (CountryCode::Kiribati, 32760),
        (CountryCode::Tuvalu, 32760),
    ])
}

/// Partial configuration, as read from a JSON file or assembled from flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollateOptions {
    /// Root directory holding one subdirectory per country
    pub root_path: Option<PathBuf>,
    /// Directory receiving `<code>.gpkg` files
    pub output_dir: Option<PathBuf>,
    /// Countries to process
    pub countries: Option<Vec<CountryCode>>,
    /// Country to EPSG code, force-assigned before reprojection
    pub override_crs_table: Option<BTreeMap<CountryCode, u16>>,
    /// Pipeline variant
    pub variant: Option<Variant>,
    /// Prefix identifying the depth column
    pub depth_prefix: Option<String>,
    /// Output layer name
    pub layer_name: Option<String>,
    /// Per-country input subdirectory
    pub input_subdir: Option<String>,
    /// Per-file error policy
    pub on_file_error: Option<FileErrorPolicy>,
}

impl CollateOptions {
    /// Parses options from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, unknown keys, or
    /// unknown country codes.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Reads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IoError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IoError::Read {
                    format: "JSON".to_string(),
                    path: path.to_path_buf(),
                    source: Box::new(e),
                }
            }
        })?;
        let options = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        Ok(options)
    }

    /// Sets the root directory.
    #[must_use]
    pub fn with_root_path(mut self, root_path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    /// Sets the countries to process.
    #[must_use]
    pub fn with_countries(mut self, countries: Vec<CountryCode>) -> Self {
        self.countries = Some(countries);
        self
    }

    /// Replaces the CRS override table.
    #[must_use]
    pub fn with_override_crs_table(mut self, table: BTreeMap<CountryCode, u16>) -> Self {
        self.override_crs_table = Some(table);
        self
    }

    /// Sets the pipeline variant.
    #[must_use]
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Sets the depth column prefix.
    #[must_use]
    pub fn with_depth_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.depth_prefix = Some(prefix.into());
        self
    }

    /// Sets the output layer name.
    #[must_use]
    pub fn with_layer_name(mut self, layer: impl Into<String>) -> Self {
        self.layer_name = Some(layer.into());
        self
    }

    /// Sets the per-country input subdirectory.
    #[must_use]
    pub fn with_input_subdir(mut self, subdir: impl Into<String>) -> Self {
        self.input_subdir = Some(subdir.into());
        self
    }

    /// Sets the per-file error policy.
    #[must_use]
    pub fn with_on_file_error(mut self, policy: FileErrorPolicy) -> Self {
        self.on_file_error = Some(policy);
        self
    }

    /// Overlays `other` on `self`; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            root_path: other.root_path.or(self.root_path),
            output_dir: other.output_dir.or(self.output_dir),
            countries: other.countries.or(self.countries),
            override_crs_table: other.override_crs_table.or(self.override_crs_table),
            variant: other.variant.or(self.variant),
            depth_prefix: other.depth_prefix.or(self.depth_prefix),
            layer_name: other.layer_name.or(self.layer_name),
            input_subdir: other.input_subdir.or(self.input_subdir),
            on_file_error: other.on_file_error.or(self.on_file_error),
        }
    }

    /// Validates the options and fills in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] without a root path and
    /// [`ConfigError::InvalidOption`] for empty country lists, empty names,
    /// or an EPSG code of zero.
    pub fn build(self) -> std::result::Result<CollateConfig, ConfigError> {
        let root_path = self.root_path.ok_or_else(|| ConfigError::MissingRequired {
            option: "root_path".to_string(),
        })?;

        let mut countries = self.countries.unwrap_or_else(|| CountryCode::ALL.to_vec());
        if countries.is_empty() {
            return Err(invalid("countries", "at least one country is required"));
        }
        let mut seen = Vec::with_capacity(countries.len());
        countries.retain(|c| {
            let first = !seen.contains(c);
            seen.push(*c);
            first
        });

        let override_crs_table = self.override_crs_table.unwrap_or_else(default_override_table);
        if let Some((country, _)) = override_crs_table.iter().find(|(_, code)| **code == 0) {
            return Err(invalid(
                "override_crs_table",
                &format!("EPSG code for {country} must be non-zero"),
            ));
        }

        let variant = self.variant.unwrap_or_default();
        let depth_prefix = self
            .depth_prefix
            .unwrap_or_else(|| variant.default_depth_prefix().to_string());
        let depth_prefix = non_empty("depth_prefix", depth_prefix)?.to_lowercase();
        let layer_name = non_empty(
            "layer_name",
            self.layer_name
                .unwrap_or_else(|| DEFAULT_LAYER_NAME.to_string()),
        )?;
        let input_subdir = non_empty(
            "input_subdir",
            self.input_subdir
                .unwrap_or_else(|| DEFAULT_INPUT_SUBDIR.to_string()),
        )?;

        Ok(CollateConfig {
            root_path,
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            countries,
            override_crs_table,
            variant,
            depth_prefix,
            layer_name,
            input_subdir,
            on_file_error: self.on_file_error.unwrap_or_default(),
        })
    }
}

fn invalid(option: &str, message: &str) -> ConfigError {
    ConfigError::InvalidOption {
        option: option.to_string(),
        message: message.to_string(),
    }
}

fn non_empty(option: &str, value: String) -> std::result::Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(invalid(option, "must not be empty"))
    } else {
        Ok(value)
    }
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateConfig {
    root_path: PathBuf,
    output_dir: PathBuf,
    countries: Vec<CountryCode>,
    override_crs_table: BTreeMap<CountryCode, u16>,
    variant: Variant,
    depth_prefix: String,
    layer_name: String,
    input_subdir: String,
    on_file_error: FileErrorPolicy,
}

impl CollateConfig {
    /// Root directory holding one subdirectory per country.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Directory receiving the output files.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Countries to process, in order, without duplicates.
    #[must_use]
    pub fn countries(&self) -> &[CountryCode] {
        &self.countries
    }

    /// The configured override table, whether or not the variant applies it.
    #[must_use]
    pub fn override_crs_table(&self) -> &BTreeMap<CountryCode, u16> {
        &self.override_crs_table
    }

    /// Pipeline variant.
    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Lower-cased depth column prefix.
    #[must_use]
    pub fn depth_prefix(&self) -> &str {
        &self.depth_prefix
    }

    /// Output layer name.
    #[must_use]
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Per-file error policy.
    #[must_use]
    pub fn on_file_error(&self) -> FileErrorPolicy {
        self.on_file_error
    }

    /// Directory searched for a country's shapefiles.
    #[must_use]
    pub fn country_dir(&self, country: CountryCode) -> PathBuf {
        self.root_path.join(country.as_str()).join(&self.input_subdir)
    }

    /// Output file for a country.
    #[must_use]
    pub fn output_path(&self, country: CountryCode) -> PathBuf {
        self.output_dir.join(format!("{country}.gpkg"))
    }

    /// EPSG code force-assigned to every dataset of `country`, if the variant
    /// applies overrides and the table has an entry.
    #[must_use]
    pub fn crs_override(&self, country: CountryCode) -> Option<u16> {
        if self.variant.applies_overrides() {
            self.override_crs_table.get(&country).copied()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollateOptions::default()
            .with_root_path("/prni")
            .build()
            .unwrap();

        assert_eq!(config.output_dir(), Path::new("data"));
        assert_eq!(config.countries().len(), 15);
        assert_eq!(config.variant(), Variant::Points);
        assert_eq!(config.depth_prefix(), "dep");
        assert_eq!(config.layer_name(), "prni");
        assert_eq!(config.on_file_error(), FileErrorPolicy::Skip);
        assert_eq!(
            config.country_dir(CountryCode::Fiji),
            PathBuf::from("/prni/FJ/Bathy_shp")
        );
        assert_eq!(
            config.output_path(CountryCode::Fiji),
            PathBuf::from("data/FJ.gpkg")
        );
    }

    #[test]
    fn test_overrides_only_apply_to_points_variant() {
        let points = CollateOptions::default().with_root_path("r").build().unwrap();
        assert_eq!(points.crs_override(CountryCode::Fiji), Some(3460));
        assert_eq!(points.crs_override(CountryCode::Kiribati), Some(32760));
        assert_eq!(points.crs_override(CountryCode::Tuvalu), Some(32760));
        assert_eq!(points.crs_override(CountryCode::Tonga), None);

        let all = CollateOptions::default()
            .with_root_path("r")
            .with_variant(Variant::AllGeometries)
            .build()
            .unwrap();
        assert_eq!(all.crs_override(CountryCode::Fiji), None);
        assert_eq!(all.depth_prefix(), "dept");
    }

    #[test]
    fn test_missing_root_path() {
        let err = CollateOptions::default().build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { option } if option == "root_path"));
    }

    #[test]
    fn test_rejects_empty_values() {
        let base = CollateOptions::default().with_root_path("r");
        assert!(matches!(
            base.clone().with_countries(vec![]).build(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "countries"
        ));
        assert!(matches!(
            base.clone().with_depth_prefix("  ").build(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "depth_prefix"
        ));
        assert!(matches!(
            base.clone().with_layer_name("").build(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "layer_name"
        ));
        assert!(matches!(
            base.with_override_crs_table(BTreeMap::from([(CountryCode::Fiji, 0)]))
                .build(),
            Err(ConfigError::InvalidOption { option, .. }) if option == "override_crs_table"
        ));
    }

    #[test]
    fn test_duplicate_countries_are_dropped() {
        let config = CollateOptions::default()
            .with_root_path("r")
            .with_countries(vec![CountryCode::Tonga, CountryCode::Fiji, CountryCode::Tonga])
            .build()
            .unwrap();
        assert_eq!(config.countries(), &[CountryCode::Tonga, CountryCode::Fiji]);
    }

    #[test]
    fn test_from_json_str() {
        let options = CollateOptions::from_json_str(
            r#"{
                "root_path": "/Volumes/PRNI_DATA/data",
                "countries": ["FJ", "to"],
                "override_crs_table": {"FJ": 3460},
                "variant": "all-geometries",
                "on_file_error": "abort-country"
            }"#,
        )
        .unwrap();
        let config = options.build().unwrap();

        assert_eq!(config.countries(), &[CountryCode::Fiji, CountryCode::Tonga]);
        assert_eq!(config.variant(), Variant::AllGeometries);
        assert_eq!(config.on_file_error(), FileErrorPolicy::AbortCountry);
        assert_eq!(config.override_crs_table().len(), 1);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = CollateOptions::from_json_str(r#"{"root": "/data"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: None, .. }));
    }

    #[test]
    fn test_merge_prefers_later_values() {
        let file = CollateOptions::default()
            .with_root_path("/from/file")
            .with_layer_name("soundings");
        let flags = CollateOptions::default().with_root_path("/from/flags");

        let merged = file.merge(flags);
        assert_eq!(merged.root_path, Some(PathBuf::from("/from/flags")));
        assert_eq!(merged.layer_name.as_deref(), Some("soundings"));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prni.json");
        std::fs::write(&path, r#"{"root_path": "/data", "depth_prefix": "DEP"}"#).unwrap();

        let config = CollateOptions::from_json_file(&path).unwrap().build().unwrap();
        assert_eq!(config.root_path(), Path::new("/data"));
        assert_eq!(config.depth_prefix(), "dep");

        let missing = CollateOptions::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(
            missing,
            crate::error::CollateError::Io(IoError::FileNotFound { .. })
        ));
    }
}
