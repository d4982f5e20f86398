use std::path::Path;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int32Type, Int64Type};
use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;
use geo::BoundingRect;
use geo_types::{Geometry, Rect};
use geozero::{CoordDimensions, ToWkb};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{Connection, Transaction, params, params_from_iter};
use tempfile::TempPath;

use prni_core_common::geometry::geometry_type_name;
use prni_core_common::{Dataset, DatasetWriter};

use crate::{APPLICATION_ID, GpkgError, USER_VERSION, quote_ident};

const WGS84_DEFINITION: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

const CORE_TABLES: &str = r"
CREATE TABLE gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
INSERT INTO gpkg_spatial_ref_sys VALUES
    ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
    ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');
";

/// [`DatasetWriter`] for GeoPackage files.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpkgWriter;

impl DatasetWriter for GpkgWriter {
    fn format_name(&self) -> &'static str {
        "GPKG"
    }

    fn write_dataset(&self, dataset: &Dataset, path: &Path, layer: &str) -> anyhow::Result<usize> {
        Ok(write_gpkg(dataset, path, layer)?)
    }
}

/// Attribute columns and their SQLite declared types.
enum Attribute<'a> {
    Real(&'a str, &'a ArrayRef),
    Integer(&'a str, &'a ArrayRef),
    Text(&'a str, &'a ArrayRef),
}

impl<'a> Attribute<'a> {
    fn classify(name: &'a str, column: &'a ArrayRef) -> Result<Self, GpkgError> {
        match column.data_type() {
            DataType::Float64 => Ok(Self::Real(name, column)),
            DataType::Int32 | DataType::Int64 => Ok(Self::Integer(name, column)),
            DataType::Utf8 => Ok(Self::Text(name, column)),
            other => Err(GpkgError::UnsupportedColumnType {
                column: name.to_string(),
                data_type: other.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Real(name, _) | Self::Integer(name, _) | Self::Text(name, _) => name,
        }
    }

    fn sql_type(&self) -> &'static str {
        match self {
            Self::Real(..) => "REAL",
            Self::Integer(..) => "INTEGER",
            Self::Text(..) => "TEXT",
        }
    }

    fn value(&self, row: usize) -> Value {
        match self {
            Self::Real(_, column) => {
                if column.is_null(row) {
                    return Value::Null;
                }
                Value::Real(column.as_primitive::<Float64Type>().value(row))
            },
            Self::Integer(_, column) => {
                if column.is_null(row) {
                    return Value::Null;
                }
                match column.data_type() {
                    DataType::Int32 => {
                        Value::Integer(i64::from(column.as_primitive::<Int32Type>().value(row)))
                    },
                    _ => Value::Integer(column.as_primitive::<Int64Type>().value(row)),
                }
            },
            Self::Text(_, column) => {
                if column.is_null(row) {
                    return Value::Null;
                }
                Value::Text(column.as_string::<i32>().value(row).to_string())
            },
        }
    }
}

/// Writes `dataset` to a new GeoPackage at `path` as feature table `layer`.
///
/// The file is built next to `path` under a temporary name and renamed over
/// `path` only once the transaction has committed, so a failed write leaves
/// any previous output untouched. Missing parent directories are created.
/// The connection is closed before returning. Returns the number of features
/// written.
///
/// # Errors
///
/// Returns an error if the dataset has no EPSG-coded CRS, contains a column
/// type with no GeoPackage mapping, or if any filesystem or SQLite operation
/// fails.
pub fn write_gpkg(dataset: &Dataset, path: &Path, layer: &str) -> Result<usize, GpkgError> {
    let srs_id = dataset
        .crs()
        .and_then(prni_core_common::Crs::epsg)
        .map(i32::from)
        .ok_or_else(|| GpkgError::MissingCrs {
            path: path.to_path_buf(),
        })?;

    let staging = staging_path(path)?;

    let batch = dataset.batch();
    let schema = batch.schema();
    let geometry_index = dataset.geometry_index();
    let attributes = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .enumerate()
        .filter(|(i, _)| *i != geometry_index)
        .map(|(_, (field, column))| Attribute::classify(field.name(), column))
        .collect::<Result<Vec<_>, _>>()?;

    let mut geometries = Vec::with_capacity(dataset.num_rows());
    for row in 0..dataset.num_rows() {
        geometries.push(dataset.geometry(row)?);
    }

    let mut connection = Connection::open(&staging).map_err(|source| GpkgError::Open {
        path: staging.to_path_buf(),
        source,
    })?;
    connection
        .pragma_update(None, "application_id", APPLICATION_ID)
        .map_err(GpkgError::sqlite("set application_id"))?;
    connection
        .pragma_update(None, "user_version", USER_VERSION)
        .map_err(GpkgError::sqlite("set user_version"))?;

    let transaction = connection
        .transaction()
        .map_err(GpkgError::sqlite("begin GeoPackage transaction"))?;
    transaction
        .execute_batch(CORE_TABLES)
        .map_err(GpkgError::sqlite("create GeoPackage metadata tables"))?;
    register_srs(&transaction, srs_id)?;

    let geometry_column = dataset.geometry_column();
    let geometry_type = layer_geometry_type(&geometries);
    create_layer(&transaction, layer, &geometry_column, geometry_type, &attributes)?;
    insert_features(
        &transaction,
        layer,
        &geometry_column,
        srs_id,
        &attributes,
        &geometries,
    )?;

    let extent = layer_extent(&geometries);
    transaction
        .execute(
            "INSERT INTO gpkg_contents
                (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
             VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                layer,
                extent.map(|r| r.min().x),
                extent.map(|r| r.min().y),
                extent.map(|r| r.max().x),
                extent.map(|r| r.max().y),
                srs_id,
            ],
        )
        .map_err(GpkgError::sqlite("register layer in gpkg_contents"))?;
    transaction
        .execute(
            "INSERT INTO gpkg_geometry_columns VALUES (?1, ?2, ?3, ?4, 0, 0)",
            params![layer, geometry_column, geometry_type, srs_id],
        )
        .map_err(GpkgError::sqlite("register layer in gpkg_geometry_columns"))?;

    transaction
        .commit()
        .map_err(GpkgError::sqlite("commit GeoPackage transaction"))?;
    connection
        .close()
        .map_err(|(_, source)| GpkgError::sqlite("close GeoPackage")(source))?;

    if path.exists() {
        debug!("Replacing existing {}", path.display());
    }
    staging.persist(path).map_err(|e| GpkgError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!(
        "Wrote {} feature(s) to {} (layer '{layer}')",
        geometries.len(),
        path.display()
    );
    Ok(geometries.len())
}

/// Creates the parent directory of `path` and reserves a hidden temporary
/// file beside it, removed on drop unless persisted.
fn staging_path(path: &Path) -> Result<TempPath, GpkgError> {
    let prepare_err = |source| GpkgError::Prepare {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(prepare_err)?;
    let file = tempfile::Builder::new()
        .prefix(".prni-")
        .suffix(".gpkg")
        .tempfile_in(parent)
        .map_err(prepare_err)?;
    Ok(file.into_temp_path())
}

/// Encodes a GeoPackage geometry blob. Points carry no envelope; other
/// geometries carry `[minx, maxx, miny, maxy]`.
fn geometry_blob(geometry: &Geometry<f64>, srs_id: i32) -> Result<Vec<u8>, GpkgError> {
    let envelope = match geometry {
        Geometry::Point(_) => Vec::new(),
        other => other
            .bounding_rect()
            .map(|r| vec![r.min().x, r.max().x, r.min().y, r.max().y])
            .unwrap_or_default(),
    };
    Ok(geometry.to_gpkg_wkb(CoordDimensions::xy(), Some(srs_id), envelope)?)
}

fn register_srs(transaction: &Transaction<'_>, srs_id: i32) -> Result<(), GpkgError> {
    let definition = if srs_id == 4326 {
        WGS84_DEFINITION
    } else {
        u16::try_from(srs_id)
            .ok()
            .and_then(crs_definitions::from_code)
            .map_or("undefined", |def| def.wkt)
    };
    transaction
        .execute(
            "INSERT INTO gpkg_spatial_ref_sys VALUES (?1, ?2, 'EPSG', ?2, ?3, NULL)",
            params![format!("EPSG:{srs_id}"), srs_id, definition],
        )
        .map_err(GpkgError::sqlite("register spatial reference system"))?;
    Ok(())
}

fn create_layer(
    transaction: &Transaction<'_>,
    layer: &str,
    geometry_column: &str,
    geometry_type: &str,
    attributes: &[Attribute<'_>],
) -> Result<(), GpkgError> {
    let mut columns = vec![
        "fid INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string(),
        format!("{} {geometry_type}", quote_ident(geometry_column)),
    ];
    columns.extend(
        attributes
            .iter()
            .map(|a| format!("{} {}", quote_ident(a.name()), a.sql_type())),
    );
    let sql = format!("CREATE TABLE {} ({})", quote_ident(layer), columns.join(", "));
    transaction
        .execute(&sql, [])
        .map_err(GpkgError::sqlite("create feature table"))?;
    Ok(())
}

fn insert_features(
    transaction: &Transaction<'_>,
    layer: &str,
    geometry_column: &str,
    srs_id: i32,
    attributes: &[Attribute<'_>],
    geometries: &[Option<Geometry<f64>>],
) -> Result<(), GpkgError> {
    let names: Vec<String> = std::iter::once(quote_ident(geometry_column))
        .chain(attributes.iter().map(|a| quote_ident(a.name())))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(layer),
        names.join(", "),
        placeholders.join(", ")
    );

    let mut statement = transaction
        .prepare(&sql)
        .map_err(GpkgError::sqlite("prepare feature insert"))?;
    for (row, geometry) in geometries.iter().enumerate() {
        let blob = match geometry {
            Some(g) => Value::Blob(geometry_blob(g, srs_id)?),
            None => Value::Null,
        };
        let values = std::iter::once(blob).chain(attributes.iter().map(|a| a.value(row)));
        statement
            .execute(params_from_iter(values))
            .map_err(GpkgError::sqlite("insert feature"))?;
    }
    Ok(())
}

/// `POINT` when every non-null geometry is a point, `GEOMETRY` otherwise.
fn layer_geometry_type(geometries: &[Option<Geometry<f64>>]) -> &'static str {
    let all_points = geometries
        .iter()
        .flatten()
        .all(|g| geometry_type_name(g) == "Point");
    if all_points { "POINT" } else { "GEOMETRY" }
}

fn layer_extent(geometries: &[Option<Geometry<f64>>]) -> Option<Rect<f64>> {
    geometries
        .iter()
        .flatten()
        .filter_map(|g| g.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}
