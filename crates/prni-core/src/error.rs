//! Error types for the collation pipeline.
//!
//! Errors are grouped by pipeline stage. [`CollateError`] is the root type and
//! delegates display formatting to the stage-specific enums.

use std::path::PathBuf;

use prni_core_common::DatasetError;
use thiserror::Error;

use crate::countries::CountryCode;

/// Main error type for collation operations.
#[derive(Debug, Error)]
pub enum CollateError {
    /// I/O errors (file read/write, path issues)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Column layout errors found while normalizing a dataset
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// CRS assignment and reprojection errors
    #[error(transparent)]
    Crs(#[from] CrsError),

    /// Errors raised while assembling a country's output
    #[error(transparent)]
    Collate(#[from] CollationError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Dataset construction and geometry decoding errors
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Generic errors from dependencies
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// I/O related errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read an input file
    #[error("Failed to read {format} file '{path}': {source}")]
    Read {
        /// The format being read (e.g., "ESRI Shapefile")
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write an output file
    #[error("Failed to write {format} file '{path}': {source}")]
    Write {
        /// The format being written
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Path is invalid
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// Why the path is invalid
        reason: String,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },
}

/// Column layout errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// No column could be identified as depth, by name or by position
    #[error("No depth column in '{path}' (columns: {columns})")]
    MissingDepthColumn {
        /// The file whose dataset lacks a depth column
        path: PathBuf,
        /// Comma-separated column names
        columns: String,
    },
}

/// CRS errors.
#[derive(Debug, Error)]
pub enum CrsError {
    /// The dataset declares no CRS and the country has no override
    #[error("{country}: '{path}' has no CRS and no override is configured")]
    MissingCrs {
        /// Country being processed
        country: CountryCode,
        /// The file without a CRS
        path: PathBuf,
    },

    /// The dataset's CRS could not be mapped to an EPSG code
    #[error("{country}: '{path}' has an unrecognized CRS '{name}'")]
    UnrecognizedCrs {
        /// Country being processed
        country: CountryCode,
        /// The file with the unrecognized CRS
        path: PathBuf,
        /// Name found in the projection file
        name: String,
    },

    /// No projection definition is known for the EPSG code
    #[error("No projection definition for EPSG:{code}")]
    UnknownEpsg {
        /// The EPSG code
        code: u16,
    },

    /// A projection definition could not be parsed
    #[error("Invalid projection definition for EPSG:{code}: {message}")]
    InvalidDefinition {
        /// The EPSG code
        code: u16,
        /// Parser message
        message: String,
    },

    /// Transforming coordinates failed
    #[error("Failed to reproject '{path}' from EPSG:{from}: {message}")]
    Reprojection {
        /// The file being reprojected
        path: PathBuf,
        /// Source EPSG code
        from: u16,
        /// Transformation error message
        message: String,
    },
}

/// Errors raised while assembling a country's output.
#[derive(Debug, Error)]
pub enum CollationError {
    /// The locator found no shapefiles
    #[error("{country}: no shapefiles found under '{directory}'")]
    NoInputFiles {
        /// Country being processed
        country: CountryCode,
        /// Directory that was searched
        directory: PathBuf,
    },

    /// Every located file was filtered out or failed
    #[error("{country}: nothing to collate ({skipped} skipped, {failed} failed)")]
    NothingToCollate {
        /// Country being processed
        country: CountryCode,
        /// Files dropped by the geometry filter
        skipped: usize,
        /// Files that failed to load or normalize
        failed: usize,
    },

    /// Concatenating or filtering record batches failed
    #[error("{country}: {source}")]
    Arrow {
        /// Country being processed
        country: CountryCode,
        /// The underlying Arrow error
        #[source]
        source: arrow::error::ArrowError,
    },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option: {option}")]
    MissingRequired {
        /// The missing option name
        option: String,
    },

    /// The configuration document could not be parsed
    #[error("Failed to parse configuration{}: {source}", path.as_ref().map(|p| format!(" '{}'", p.display())).unwrap_or_default())]
    Parse {
        /// The configuration file, when read from disk
        path: Option<PathBuf>,
        /// The JSON error
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for Results using `CollateError`.
pub type Result<T> = std::result::Result<T, CollateError>;

impl CollateError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(e) => e.user_message(),
            Self::Schema(e) => e.to_string(),
            Self::Crs(e) => format!("CRS error: {e}"),
            Self::Collate(e) => e.to_string(),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Dataset(e) => format!("Dataset error: {e}"),
            Self::Other(e) => format!("Error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Io(e) => e.recovery_suggestion(),
            Self::Schema(SchemaError::MissingDepthColumn { .. }) => Some(
                "Rename the depth attribute so it starts with the depth prefix, or set 'depth_prefix'."
                    .to_string(),
            ),
            Self::Crs(e) => e.recovery_suggestion(),
            Self::Collate(e) => e.recovery_suggestion(),
            Self::Config(ConfigError::Parse { .. }) => {
                Some("Check the configuration file is valid JSON with known keys.".to_string())
            },
            _ => None,
        }
    }

    /// Check if this error is potentially recoverable.
    ///
    /// Recoverable errors might be fixed by changing configuration and
    /// running again.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Crs(CrsError::MissingCrs { .. } | CrsError::UnrecognizedCrs { .. })
        )
    }
}

impl IoError {
    fn user_message(&self) -> String {
        match self {
            Self::Read { format, path, .. } => {
                format!("Failed to read {} file: {}", format, path.display())
            },
            Self::Write { format, path, .. } => {
                format!("Failed to write {} file: {}", format, path.display())
            },
            Self::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            },
            Self::InvalidPath { .. } => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::FileNotFound { .. } => {
                Some("Check that the file path is correct and the file exists.".to_string())
            },
            Self::InvalidPath { .. } => {
                Some("Ensure the path is valid UTF-8 and properly formatted.".to_string())
            },
            Self::Read { .. } => {
                Some("Check that the .shx and .dbf sidecar files are present.".to_string())
            },
            Self::Write { .. } => None,
        }
    }
}

impl CrsError {
    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::MissingCrs { country, .. } | Self::UnrecognizedCrs { country, .. } => Some(
                format!("Add a .prj file, or add {country} to 'override_crs_table'."),
            ),
            Self::UnknownEpsg { .. } => {
                Some("Use an EPSG code from the EPSG registry.".to_string())
            },
            _ => None,
        }
    }
}

impl CollationError {
    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::NoInputFiles { .. } => {
                Some("Check 'root_path' and 'input_subdir' in the configuration.".to_string())
            },
            Self::NothingToCollate { .. } => {
                Some("Run with --verbose to see why each file was dropped.".to_string())
            },
            Self::Arrow { .. } => None,
        }
    }
}

/// Extension trait for adding I/O context to errors.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            CollateError::Io(IoError::Read {
                format: format.to_string(),
                path: path.into(),
                source: e.into(),
            })
        })
    }

    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            CollateError::Io(IoError::Write {
                format: format.to_string(),
                path: path.into(),
                source: e.into(),
            })
        })
    }
}
