use std::path::PathBuf;

use arrow_schema::{ArrowError, DataType};
use geozero::error::GeozeroError;
use prni_core_common::DatasetError;
use rusqlite::Error as SqliteError;
use thiserror::Error;

/// Errors raised when reading or writing GeoPackage files.
#[derive(Debug, Error)]
pub enum GpkgError {
    /// Preparing the output location failed.
    #[error("failed to prepare output path {path:?}")]
    Prepare {
        /// Path being prepared.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Moving the finished file into place failed.
    #[error("failed to move finished GeoPackage to {path:?}")]
    Persist {
        /// Final output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Opening the SQLite database failed.
    #[error("failed to open GeoPackage at {path:?}")]
    Open {
        /// Database path.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },

    /// An SQL statement failed.
    #[error("failed to {action}")]
    Sqlite {
        /// What was being attempted.
        action: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },

    /// The requested layer does not exist.
    #[error("layer '{layer}' not found in {path:?}")]
    LayerNotFound {
        /// Database path.
        path: PathBuf,
        /// Requested layer name.
        layer: String,
    },

    /// The file contains no feature table.
    #[error("no feature layer in {path:?}")]
    NoFeatureLayer {
        /// Database path.
        path: PathBuf,
    },

    /// The dataset to write has no EPSG-coded CRS.
    #[error("cannot write {path:?}: dataset CRS must be an EPSG code")]
    MissingCrs {
        /// Output path.
        path: PathBuf,
    },

    /// An attribute column type has no GeoPackage mapping.
    #[error("column '{column}' has unsupported type {data_type}")]
    UnsupportedColumnType {
        /// Column name.
        column: String,
        /// Arrow type of the column.
        data_type: DataType,
    },

    /// A geometry could not be encoded or decoded.
    #[error(transparent)]
    Wkb(#[from] GeozeroError),

    /// Building Arrow arrays failed.
    #[error(transparent)]
    Arrow(#[from] ArrowError),

    /// The dataset could not be inspected or assembled.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl GpkgError {
    pub(crate) fn sqlite(action: &'static str) -> impl FnOnce(SqliteError) -> Self {
        move |source| Self::Sqlite { action, source }
    }
}
