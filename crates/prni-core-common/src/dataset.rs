//! In-memory tabular dataset with a designated WKB geometry column.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, BinaryArray, RecordBatch};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use geo_types::Geometry;
use geozero::error::GeozeroError;
use thiserror::Error;

use crate::crs::Crs;
use crate::geometry::decode_wkb;

/// Canonical name of the geometry column.
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Arrow extension metadata key used to tag the geometry field.
pub const EXTENSION_NAME_KEY: &str = "ARROW:extension:name";

/// `GeoArrow` extension name for WKB-encoded geometries.
pub const WKB_EXTENSION: &str = "geoarrow.wkb";

/// Errors raised while building or inspecting a [`Dataset`].
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The geometry column index is outside the schema.
    #[error("geometry column index {index} out of range for {columns} column(s)")]
    GeometryIndexOutOfRange {
        /// Requested geometry column index.
        index: usize,
        /// Number of columns in the batch.
        columns: usize,
    },

    /// The geometry column is not WKB binary.
    #[error("geometry column '{name}' must be Binary (WKB), found {found}")]
    GeometryNotBinary {
        /// Name of the geometry column.
        name: String,
        /// Actual Arrow type of the column.
        found: DataType,
    },

    /// A geometry value could not be decoded.
    #[error("invalid WKB geometry at row {row}: {source}")]
    InvalidGeometry {
        /// Row holding the bad geometry.
        row: usize,
        /// Decoder error.
        #[source]
        source: GeozeroError,
    },

    /// Rebuilding the record batch failed.
    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

/// Builds the Arrow field for a WKB geometry column.
#[must_use]
pub fn geometry_field(name: &str) -> Field {
    Field::new(name, DataType::Binary, true).with_metadata(HashMap::from([(
        EXTENSION_NAME_KEY.to_string(),
        WKB_EXTENSION.to_string(),
    )]))
}

/// A dataset read from one source: attribute columns, one geometry column
/// holding WKB, and an optional CRS.
///
/// Datasets are immutable values; every transformation consumes the dataset
/// and returns a new one.
#[derive(Debug, Clone)]
pub struct Dataset {
    source: PathBuf,
    batch: RecordBatch,
    geometry_index: usize,
    crs: Option<Crs>,
}

impl Dataset {
    /// Creates a dataset, validating the geometry column.
    ///
    /// # Errors
    ///
    /// Returns an error if `geometry_index` is out of range or the column is
    /// not `Binary`.
    pub fn try_new(
        source: impl Into<PathBuf>,
        batch: RecordBatch,
        geometry_index: usize,
        crs: Option<Crs>,
    ) -> Result<Self, DatasetError> {
        let schema = batch.schema();
        let Some(field) = schema.fields().get(geometry_index) else {
            return Err(DatasetError::GeometryIndexOutOfRange {
                index: geometry_index,
                columns: schema.fields().len(),
            });
        };
        if field.data_type() != &DataType::Binary {
            return Err(DatasetError::GeometryNotBinary {
                name: field.name().clone(),
                found: field.data_type().clone(),
            });
        }

        Ok(Self {
            source: source.into(),
            batch,
            geometry_index,
            crs,
        })
    }

    /// Path of the file this dataset was read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The underlying record batch, geometry column included.
    #[must_use]
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Zero-based index of the designated geometry column.
    #[must_use]
    pub fn geometry_index(&self) -> usize {
        self.geometry_index
    }

    /// Name of the designated geometry column.
    #[must_use]
    pub fn geometry_column(&self) -> String {
        self.batch.schema().field(self.geometry_index).name().clone()
    }

    /// Declared CRS, if any.
    #[must_use]
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Number of features.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Column names in schema order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Returns the dataset with its CRS replaced.
    #[must_use]
    pub fn with_crs(self, crs: Option<Crs>) -> Self {
        Self { crs, ..self }
    }

    /// Renames columns through `rename`, which receives each column's index
    /// and current name. Column order and data are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the record batch cannot be rebuilt.
    pub fn map_column_names(
        self,
        mut rename: impl FnMut(usize, &str) -> String,
    ) -> Result<Self, DatasetError> {
        let schema = self.batch.schema();
        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| f.as_ref().clone().with_name(rename(i, f.name())))
            .collect();
        let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
        let batch = RecordBatch::try_new(Arc::new(schema), self.batch.columns().to_vec())?;
        Ok(Self { batch, ..self })
    }

    /// Renames the column at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record batch cannot be rebuilt.
    pub fn rename_column(self, index: usize, name: &str) -> Result<Self, DatasetError> {
        self.map_column_names(|i, current| {
            if i == index {
                name.to_string()
            } else {
                current.to_string()
            }
        })
    }

    /// The geometry column as a WKB array.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is not `Binary`.
    pub fn geometries(&self) -> Result<&BinaryArray, DatasetError> {
        let column = self.batch.column(self.geometry_index);
        column
            .as_binary_opt::<i32>()
            .ok_or_else(|| DatasetError::GeometryNotBinary {
                name: self.geometry_column(),
                found: column.data_type().clone(),
            })
    }

    /// Decodes the geometry at `row`; `None` when the value is null.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored WKB is invalid.
    pub fn geometry(&self, row: usize) -> Result<Option<Geometry<f64>>, DatasetError> {
        let geometries = self.geometries()?;
        if row >= geometries.len() || geometries.is_null(row) {
            return Ok(None);
        }
        decode_wkb(geometries.value(row))
            .map(Some)
            .map_err(|source| DatasetError::InvalidGeometry { row, source })
    }

    /// Returns the dataset with its geometry column replaced by `wkb`.
    ///
    /// # Errors
    ///
    /// Returns an error if `wkb` has a different length than the dataset.
    pub fn with_geometries(self, wkb: BinaryArray) -> Result<Self, DatasetError> {
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();
        columns[self.geometry_index] = Arc::new(wkb);
        let batch = RecordBatch::try_new(self.batch.schema(), columns)?;
        Ok(Self { batch, ..self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::encode_wkb;
    use arrow_array::{Float64Array, StringArray};
    use geo_types::point;

    fn sample() -> Dataset {
        let wkb = encode_wkb(&Geometry::Point(point!(x: 1.0, y: 2.0))).unwrap();
        let schema = Schema::new(vec![
            Field::new("Name", DataType::Utf8, true),
            Field::new("Depth_m", DataType::Float64, true),
            geometry_field("SHAPE"),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("a"), None])),
                Arc::new(Float64Array::from(vec![Some(3.5), None])),
                Arc::new(BinaryArray::from_opt_vec(vec![Some(wkb.as_slice()), None])),
            ],
        )
        .unwrap();
        Dataset::try_new("sample.shp", batch, 2, Some(Crs::WGS84)).unwrap()
    }

    #[test]
    fn test_geometry_column_is_designated_by_index() {
        let dataset = sample();
        assert_eq!(dataset.geometry_column(), "SHAPE");
        assert_eq!(dataset.num_rows(), 2);
        assert_eq!(dataset.crs(), Some(&Crs::WGS84));
    }

    #[test]
    fn test_rename_keeps_data_and_designation() {
        let dataset = sample().rename_column(2, "geometry").unwrap();
        assert_eq!(dataset.column_names(), vec!["Name", "Depth_m", "geometry"]);
        assert_eq!(dataset.geometry_column(), "geometry");
        assert_eq!(
            dataset.geometry(0).unwrap(),
            Some(Geometry::Point(point!(x: 1.0, y: 2.0)))
        );
        assert_eq!(dataset.geometry(1).unwrap(), None);
    }

    #[test]
    fn test_geometry_field_is_tagged_as_wkb() {
        let dataset = sample();
        let schema = dataset.batch().schema();
        let field = schema.field(2);
        assert_eq!(
            field.metadata().get(EXTENSION_NAME_KEY).map(String::as_str),
            Some(WKB_EXTENSION)
        );
    }

    #[test]
    fn test_non_binary_geometry_rejected() {
        let schema = Schema::new(vec![Field::new("geometry", DataType::Float64, true)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Float64Array::from(vec![1.0]))],
        )
        .unwrap();
        let err = Dataset::try_new("bad.shp", batch, 0, None).unwrap_err();
        assert!(matches!(err, DatasetError::GeometryNotBinary { .. }));
    }

    #[test]
    fn test_out_of_range_geometry_index_rejected() {
        let batch = sample().batch().clone();
        let err = Dataset::try_new("bad.shp", batch, 7, None).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::GeometryIndexOutOfRange { index: 7, columns: 3 }
        ));
    }
}
