use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::builder::{BinaryBuilder, Float64Builder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use geo_types::Geometry;
use geozero::error::GeozeroError;
use log::debug;
use shapefile::Shape;
use shapefile::dbase::{self, FieldType, FieldValue, Record};
use thiserror::Error;

use prni_core_common::dataset::geometry_field;
use prni_core_common::geometry::encode_wkb;
use prni_core_common::{Crs, Dataset, DatasetError, DatasetReader, GEOMETRY_COLUMN};

/// Errors raised while reading a shapefile.
#[derive(Debug, Error)]
pub enum ShapefileError {
    /// The `.shp` geometry file could not be read.
    #[error("failed to read shapes from {path:?}")]
    Shapes {
        /// Path of the `.shp` file.
        path: PathBuf,
        /// Source error returned by `shapefile`.
        #[source]
        source: shapefile::Error,
    },

    /// The `.dbf` attribute table could not be read.
    #[error("failed to read attributes from {path:?}")]
    Attributes {
        /// Path of the `.dbf` file.
        path: PathBuf,
        /// Source error returned by `dbase`.
        #[source]
        source: dbase::Error,
    },

    /// The `.prj` sidecar exists but could not be read.
    #[error("failed to read projection from {path:?}")]
    Projection {
        /// Path of the `.prj` file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The geometry and attribute files disagree on the feature count.
    #[error("{path:?} has {shapes} shape(s) but {records} attribute record(s)")]
    RecordCountMismatch {
        /// Path of the `.shp` file.
        path: PathBuf,
        /// Number of shapes read.
        shapes: usize,
        /// Number of attribute records read.
        records: usize,
    },

    /// A shape could not be converted to a simple-features geometry.
    #[error("shape {index} in {path:?} is not convertible: {message}")]
    Geometry {
        /// Path of the `.shp` file.
        path: PathBuf,
        /// Zero-based shape index.
        index: usize,
        /// Conversion failure description.
        message: String,
    },

    /// A geometry could not be encoded as WKB.
    #[error("failed to encode shape {index} in {path:?} as WKB")]
    Wkb {
        /// Path of the `.shp` file.
        path: PathBuf,
        /// Zero-based shape index.
        index: usize,
        /// Encoder error.
        #[source]
        source: GeozeroError,
    },

    /// The assembled columns did not form a valid dataset.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// [`DatasetReader`] for ESRI Shapefiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapefileReader;

impl DatasetReader for ShapefileReader {
    fn format_name(&self) -> &'static str {
        "ESRI Shapefile"
    }

    fn read_dataset(&self, path: &Path) -> anyhow::Result<Dataset> {
        Ok(read_shapefile(path)?)
    }
}

/// Attribute column kinds; numeric DBF types become `Float64`, the rest `Utf8`.
enum Column {
    Real(Float64Builder),
    Text(StringBuilder),
}

impl Column {
    fn for_field(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Numeric
            | FieldType::Float
            | FieldType::Double
            | FieldType::Integer
            | FieldType::Currency => Self::Real(Float64Builder::new()),
            _ => Self::Text(StringBuilder::new()),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Real(_) => DataType::Float64,
            Self::Text(_) => DataType::Utf8,
        }
    }

    fn append(&mut self, value: Option<&FieldValue>) {
        match self {
            Self::Real(builder) => builder.append_option(numeric_value(value)),
            Self::Text(builder) => builder.append_option(text_value(value)),
        }
    }

    fn finish(self) -> ArrayRef {
        match self {
            Self::Real(mut builder) => Arc::new(builder.finish()),
            Self::Text(mut builder) => Arc::new(builder.finish()),
        }
    }
}

fn numeric_value(value: Option<&FieldValue>) -> Option<f64> {
    match value? {
        FieldValue::Numeric(v) => *v,
        FieldValue::Float(v) => v.map(f64::from),
        FieldValue::Integer(v) => Some(f64::from(*v)),
        FieldValue::Double(v) | FieldValue::Currency(v) => Some(*v),
        FieldValue::Character(Some(text)) => text.trim().parse().ok(),
        _ => None,
    }
}

fn text_value(value: Option<&FieldValue>) -> Option<String> {
    match value? {
        FieldValue::Character(text) => text.clone(),
        FieldValue::Memo(text) => Some(text.clone()),
        FieldValue::Logical(flag) => flag.map(|b| b.to_string()),
        other => numeric_value(Some(other)).map(|n| n.to_string()),
    }
}

/// Finds a sidecar file next to `shp`, trying the lower-case extension first
/// and then the upper-case one.
fn sidecar(shp: &Path, extension: &str) -> PathBuf {
    let lower = shp.with_extension(extension);
    if lower.exists() {
        return lower;
    }
    let upper = shp.with_extension(extension.to_ascii_uppercase());
    if upper.exists() { upper } else { lower }
}

fn shape_to_wkb(path: &Path, index: usize, shape: Shape) -> Result<Option<Vec<u8>>, ShapefileError> {
    if matches!(shape, Shape::NullShape) {
        return Ok(None);
    }
    let geometry =
        Geometry::<f64>::try_from(shape).map_err(|e| ShapefileError::Geometry {
            path: path.to_path_buf(),
            index,
            message: e.to_string(),
        })?;
    encode_wkb(&geometry)
        .map(Some)
        .map_err(|source| ShapefileError::Wkb {
            path: path.to_path_buf(),
            index,
            source,
        })
}

/// Reads a shapefile and its sidecars into a [`Dataset`].
///
/// Column order follows the DBF header, with the geometry column appended
/// last under the name `geometry`. Null shapes become null geometries.
///
/// # Errors
///
/// Returns an error if any of the `.shp`, `.dbf` or `.prj` files cannot be
/// read, or if the shape and record counts differ.
pub fn read_shapefile(path: &Path) -> Result<Dataset, ShapefileError> {
    let shapes = shapefile::read_shapes(path).map_err(|source| ShapefileError::Shapes {
        path: path.to_path_buf(),
        source,
    })?;

    let dbf_path = sidecar(path, "dbf");
    let (fields, records) = read_attributes(&dbf_path)?;
    if shapes.len() != records.len() {
        return Err(ShapefileError::RecordCountMismatch {
            path: path.to_path_buf(),
            shapes: shapes.len(),
            records: records.len(),
        });
    }

    let prj_path = sidecar(path, "prj");
    let crs = Crs::from_prj_file(&prj_path).map_err(|source| ShapefileError::Projection {
        path: prj_path.clone(),
        source,
    })?;

    let mut columns: Vec<(String, Column)> = fields
        .into_iter()
        .map(|(name, field_type)| (name, Column::for_field(field_type)))
        .collect();
    for record in &records {
        for (name, column) in &mut columns {
            column.append(record.get(name.as_str()));
        }
    }

    let mut geometries = BinaryBuilder::new();
    for (index, shape) in shapes.into_iter().enumerate() {
        geometries.append_option(shape_to_wkb(path, index, shape)?);
    }

    let mut schema_fields: Vec<Field> = columns
        .iter()
        .map(|(name, column)| Field::new(name, column.data_type(), true))
        .collect();
    schema_fields.push(geometry_field(GEOMETRY_COLUMN));
    let geometry_index = schema_fields.len() - 1;

    let mut arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, c)| c.finish()).collect();
    arrays.push(Arc::new(geometries.finish()));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(schema_fields)), arrays)
        .map_err(DatasetError::from)?;

    debug!(
        "Read {} feature(s) from {} (CRS: {})",
        batch.num_rows(),
        path.display(),
        crs.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
    );

    Ok(Dataset::try_new(path, batch, geometry_index, crs)?)
}

fn read_attributes(path: &Path) -> Result<(Vec<(String, FieldType)>, Vec<Record>), ShapefileError> {
    let map_err = |source| ShapefileError::Attributes {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = dbase::Reader::from_path(path).map_err(map_err)?;
    let fields = reader
        .fields()
        .iter()
        .filter(|f| f.name() != "DeletionFlag")
        .map(|f| (f.name().to_string(), f.field_type()))
        .collect();
    let records = reader.read().map_err(map_err)?;
    Ok((fields, records))
}
