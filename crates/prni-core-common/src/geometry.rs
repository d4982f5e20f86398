//! WKB encoding helpers for the geometry column.
//!
//! Datasets keep geometries as WKB in an Arrow `Binary` column; these helpers
//! convert between that representation and [`geo_types::Geometry`].

use geo_types::Geometry;
use geozero::error::GeozeroError;
use geozero::wkb::Wkb;
use geozero::{CoordDimensions, ToGeo, ToWkb};

/// Encodes a geometry as 2D WKB.
///
/// # Errors
///
/// Returns an error if `geozero` cannot serialize the geometry.
pub fn encode_wkb(geometry: &Geometry<f64>) -> Result<Vec<u8>, GeozeroError> {
    geometry.to_wkb(CoordDimensions::xy())
}

/// Decodes WKB into a geometry.
///
/// # Errors
///
/// Returns an error if the bytes are not valid WKB.
pub fn decode_wkb(bytes: &[u8]) -> Result<Geometry<f64>, GeozeroError> {
    Wkb(bytes.to_vec()).to_geo()
}

/// Returns the simple-features type name of a geometry (`"Point"`, `"Polygon"`, ...).
#[must_use]
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}
