use std::path::Path;
use std::sync::Arc;

use arrow_array::builder::{BinaryBuilder, Float64Builder, Int64Builder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use geozero::ToGeo;
use geozero::wkb::GpkgWkb;
use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use prni_core_common::dataset::geometry_field;
use prni_core_common::geometry::encode_wkb;
use prni_core_common::{Crs, Dataset, DatasetReader};

use crate::{GpkgError, quote_ident};

/// [`DatasetReader`] for GeoPackage files. Reads the first feature layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpkgReader;

impl DatasetReader for GpkgReader {
    fn format_name(&self) -> &'static str {
        "GPKG"
    }

    fn read_dataset(&self, path: &Path) -> anyhow::Result<Dataset> {
        Ok(read_gpkg(path, None)?)
    }
}

struct LayerInfo {
    table: String,
    geometry_column: String,
    crs: Option<Crs>,
}

enum Column {
    Geometry(BinaryBuilder),
    Real(Float64Builder),
    Integer(Int64Builder),
    Text(StringBuilder),
}

impl Column {
    fn for_declared_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if ["REAL", "DOUBLE", "FLOAT"].iter().any(|t| upper.contains(t)) {
            Self::Real(Float64Builder::new())
        } else if upper.contains("INT") || upper == "BOOLEAN" {
            Self::Integer(Int64Builder::new())
        } else {
            Self::Text(StringBuilder::new())
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            Self::Geometry(_) => DataType::Binary,
            Self::Real(_) => DataType::Float64,
            Self::Integer(_) => DataType::Int64,
            Self::Text(_) => DataType::Utf8,
        }
    }

    fn append(&mut self, value: ValueRef<'_>) -> Result<(), GpkgError> {
        match (self, value) {
            (Self::Geometry(b), ValueRef::Blob(bytes)) => {
                let geometry = GpkgWkb(bytes).to_geo()?;
                b.append_value(encode_wkb(&geometry)?);
            },
            (Self::Geometry(b), _) => b.append_null(),
            (Self::Real(b), ValueRef::Real(v)) => b.append_value(v),
            #[allow(clippy::cast_precision_loss)]
            (Self::Real(b), ValueRef::Integer(v)) => b.append_value(v as f64),
            (Self::Real(b), _) => b.append_null(),
            (Self::Integer(b), ValueRef::Integer(v)) => b.append_value(v),
            (Self::Integer(b), _) => b.append_null(),
            (Self::Text(b), ValueRef::Text(bytes)) => {
                b.append_value(String::from_utf8_lossy(bytes));
            },
            (Self::Text(b), ValueRef::Integer(v)) => b.append_value(v.to_string()),
            (Self::Text(b), ValueRef::Real(v)) => b.append_value(v.to_string()),
            (Self::Text(b), _) => b.append_null(),
        }
        Ok(())
    }

    fn finish(self) -> ArrayRef {
        match self {
            Self::Geometry(mut b) => Arc::new(b.finish()),
            Self::Real(mut b) => Arc::new(b.finish()),
            Self::Integer(mut b) => Arc::new(b.finish()),
            Self::Text(mut b) => Arc::new(b.finish()),
        }
    }
}

/// Reads a feature layer from the GeoPackage at `path`.
///
/// With `layer` set to `None` the first feature layer listed in
/// `gpkg_contents` is read. The primary key column is dropped; the geometry
/// column keeps its table position and is returned as WKB.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the layer does not exist,
/// or a geometry blob is malformed.
pub fn read_gpkg(path: &Path, layer: Option<&str>) -> Result<Dataset, GpkgError> {
    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|source| GpkgError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let info = layer_info(&connection, path, layer)?;
    debug!(
        "Reading layer '{}' from {} (geometry column '{}')",
        info.table,
        path.display(),
        info.geometry_column
    );

    let mut names = Vec::new();
    let mut columns = Vec::new();
    let mut pk = None;
    {
        let mut statement = connection
            .prepare(&format!("PRAGMA table_info({})", quote_ident(&info.table)))
            .map_err(GpkgError::sqlite("read table schema"))?;
        let mut rows = statement
            .query([])
            .map_err(GpkgError::sqlite("read table schema"))?;
        while let Some(row) = rows.next().map_err(GpkgError::sqlite("read table schema"))? {
            let name: String = row.get(1).map_err(GpkgError::sqlite("read table schema"))?;
            let declared: String = row.get(2).map_err(GpkgError::sqlite("read table schema"))?;
            let is_pk: i64 = row.get(5).map_err(GpkgError::sqlite("read table schema"))?;
            if is_pk != 0 {
                pk = Some(name);
                continue;
            }
            let column = if name == info.geometry_column {
                Column::Geometry(BinaryBuilder::new())
            } else {
                Column::for_declared_type(&declared)
            };
            names.push(name);
            columns.push(column);
        }
    }

    let geometry_index = names
        .iter()
        .position(|n| *n == info.geometry_column)
        .ok_or_else(|| GpkgError::LayerNotFound {
            path: path.to_path_buf(),
            layer: info.table.clone(),
        })?;

    let select = names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ");
    let order = pk.map(|pk| format!(" ORDER BY {}", quote_ident(&pk))).unwrap_or_default();
    let sql = format!("SELECT {select} FROM {}{order}", quote_ident(&info.table));

    let mut statement = connection
        .prepare(&sql)
        .map_err(GpkgError::sqlite("read features"))?;
    let mut rows = statement
        .query([])
        .map_err(GpkgError::sqlite("read features"))?;
    while let Some(row) = rows.next().map_err(GpkgError::sqlite("read features"))? {
        for (i, column) in columns.iter_mut().enumerate() {
            let value = row.get_ref(i).map_err(GpkgError::sqlite("read features"))?;
            column.append(value)?;
        }
    }

    let fields: Vec<Field> = names
        .iter()
        .zip(&columns)
        .map(|(name, column)| match column {
            Column::Geometry(_) => geometry_field(name),
            other => Field::new(name, other.data_type(), true),
        })
        .collect();
    let arrays: Vec<ArrayRef> = columns.into_iter().map(Column::finish).collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

    Ok(Dataset::try_new(path, batch, geometry_index, info.crs)?)
}

fn layer_info(
    connection: &Connection,
    path: &Path,
    layer: Option<&str>,
) -> Result<LayerInfo, GpkgError> {
    let table = match layer {
        Some(layer) => layer.to_string(),
        None => connection
            .query_row(
                "SELECT table_name FROM gpkg_contents WHERE data_type = 'features'
                 ORDER BY rowid LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(GpkgError::sqlite("list feature layers"))?
            .ok_or_else(|| GpkgError::NoFeatureLayer {
                path: path.to_path_buf(),
            })?,
    };

    let found: Option<(String, i64, Option<String>, Option<i64>, Option<String>)> = connection
        .query_row(
            "SELECT g.column_name, g.srs_id, s.organization, s.organization_coordsys_id, s.srs_name
             FROM gpkg_geometry_columns g
             LEFT JOIN gpkg_spatial_ref_sys s ON s.srs_id = g.srs_id
             WHERE g.table_name = ?1",
            params![table],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .optional()
        .map_err(GpkgError::sqlite("look up geometry column"))?;

    let Some((geometry_column, srs_id, organization, code, srs_name)) = found else {
        return Err(GpkgError::LayerNotFound {
            path: path.to_path_buf(),
            layer: table,
        });
    };

    let crs = match (organization.as_deref(), code) {
        _ if srs_id <= 0 => None,
        (Some(org), Some(code)) if org.eq_ignore_ascii_case("EPSG") => {
            u16::try_from(code).ok().map(Crs::Epsg)
        },
        _ => Some(Crs::Unrecognized(srs_name.unwrap_or_else(|| srs_id.to_string()))),
    };

    Ok(LayerInfo {
        table,
        geometry_column,
        crs,
    })
}
