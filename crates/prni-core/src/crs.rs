//! CRS reconciliation and reprojection to WGS84.

use std::path::Path;

use arrow::array::BinaryBuilder;
use geo::MapCoords;
use geo_types::{Coord, Geometry};
use log::{debug, info};
use prni_core_common::geometry::encode_wkb;
use prni_core_common::{Crs, Dataset};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::countries::CountryCode;
use crate::error::{CrsError, Result};

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Looks up the proj4 definition of an EPSG code.
///
/// # Errors
///
/// Returns [`CrsError::UnknownEpsg`] when the code is not in the registry.
pub fn proj4_definition(code: u16) -> std::result::Result<&'static str, CrsError> {
    if code == 4326 {
        return Ok(WGS84_PROJ4);
    }
    crs_definitions::from_code(code)
        .map(|def| def.proj4)
        .ok_or(CrsError::UnknownEpsg { code })
}

/// Transforms coordinates from one EPSG code to WGS84 longitude/latitude.
pub struct Reprojector {
    code: u16,
    source: Proj,
    target: Proj,
    source_geographic: bool,
}

impl Reprojector {
    /// Builds a transformation from `EPSG:<code>` to EPSG:4326.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is unknown or its definition cannot be
    /// parsed.
    pub fn to_wgs84(code: u16) -> std::result::Result<Self, CrsError> {
        let definition = proj4_definition(code)?.replace(" +type=crs", "");
        let parse = |text: &str| {
            Proj::from_proj_string(text).map_err(|e| CrsError::InvalidDefinition {
                code,
                message: e.to_string(),
            })
        };
        Ok(Self {
            code,
            source: parse(&definition)?,
            target: parse(WGS84_PROJ4)?,
            source_geographic: definition.contains("+proj=longlat")
                || definition.contains("+proj=latlong"),
        })
    }

    /// The source EPSG code.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Transforms a single coordinate. Output is in degrees.
    ///
    /// # Errors
    ///
    /// Returns the projection library's error message on failure.
    pub fn transform_coord(&self, coord: Coord<f64>) -> std::result::Result<Coord<f64>, String> {
        let mut point = if self.source_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(&self.source, &self.target, &mut point).map_err(|e| e.to_string())?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }

    /// Transforms every coordinate of `geometry`.
    ///
    /// # Errors
    ///
    /// Returns the projection library's error message on failure.
    pub fn transform(&self, geometry: &Geometry<f64>) -> std::result::Result<Geometry<f64>, String> {
        geometry.try_map_coords(|c| self.transform_coord(c))
    }
}

/// Picks the EPSG code a dataset's coordinates are interpreted in.
///
/// An override always wins over the declared CRS.
///
/// # Errors
///
/// Returns [`CrsError::MissingCrs`] or [`CrsError::UnrecognizedCrs`] when
/// there is no override and the declared CRS is absent or unresolved.
pub fn source_epsg(
    dataset: &Dataset,
    country: CountryCode,
    override_epsg: Option<u16>,
) -> std::result::Result<u16, CrsError> {
    if let Some(code) = override_epsg {
        if dataset.crs().and_then(Crs::epsg) != Some(code) {
            info!(
                "{}: assigning EPSG:{code} (declared {})",
                dataset.source().display(),
                dataset
                    .crs()
                    .map_or_else(|| "none".to_string(), ToString::to_string)
            );
        }
        return Ok(code);
    }
    match dataset.crs() {
        Some(Crs::Epsg(code)) => Ok(*code),
        Some(Crs::Unrecognized(name)) => Err(CrsError::UnrecognizedCrs {
            country,
            path: dataset.source().to_path_buf(),
            name: name.clone(),
        }),
        None => Err(CrsError::MissingCrs {
            country,
            path: dataset.source().to_path_buf(),
        }),
    }
}

/// Assigns the override CRS if any, then reprojects `dataset` to EPSG:4326.
///
/// Datasets already in EPSG:4326 keep their coordinates untouched.
///
/// # Errors
///
/// Returns a [`CrsError`] when the source CRS cannot be determined or the
/// coordinates cannot be transformed.
pub fn reconcile_crs(
    dataset: Dataset,
    country: CountryCode,
    override_epsg: Option<u16>,
) -> Result<Dataset> {
    let code = source_epsg(&dataset, country, override_epsg)?;
    if code == 4326 {
        return Ok(dataset.with_crs(Some(Crs::WGS84)));
    }
    let reprojector = Reprojector::to_wgs84(code)?;
    reproject(dataset, &reprojector)
}

/// Reprojects every geometry of `dataset` with `reprojector`.
///
/// # Errors
///
/// Returns [`CrsError::Reprojection`] if a coordinate cannot be transformed.
pub fn reproject(dataset: Dataset, reprojector: &Reprojector) -> Result<Dataset> {
    let source = dataset.source().to_path_buf();
    let fail = |message: String| reprojection_error(&source, reprojector.code(), message);

    let mut builder = BinaryBuilder::with_capacity(dataset.num_rows(), dataset.num_rows() * 21);
    for row in 0..dataset.num_rows() {
        match dataset.geometry(row)? {
            Some(geometry) => {
                let projected = reprojector.transform(&geometry).map_err(fail)?;
                let wkb = encode_wkb(&projected).map_err(|e| fail(e.to_string()))?;
                builder.append_value(wkb);
            },
            None => builder.append_null(),
        }
    }
    debug!(
        "Reprojected {} feature(s) of {} from EPSG:{} to EPSG:4326",
        dataset.num_rows(),
        source.display(),
        reprojector.code()
    );

    Ok(dataset
        .with_geometries(builder.finish())?
        .with_crs(Some(Crs::WGS84)))
}

fn reprojection_error(path: &Path, from: u16, message: String) -> CrsError {
    CrsError::Reprojection {
        path: path.to_path_buf(),
        from,
        message,
    }
}
