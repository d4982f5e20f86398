//! Point geometry filter.
//!
//! A dataset is kept when its first record holds a `Point`. Only the first
//! record is sampled; mixed files are classified by their leading feature.

use std::fmt;

use geo_types::Geometry;
use log::info;
use prni_core_common::Dataset;
use prni_core_common::geometry::geometry_type_name;

use crate::error::Result;

/// Classification of a dataset's first geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryCheck {
    /// The first geometry is a point.
    Point,
    /// The first geometry has another type.
    Other(&'static str),
    /// The dataset has no records.
    Empty,
    /// The first record has no geometry.
    NullGeometry,
}

impl GeometryCheck {
    /// Whether the dataset passes the point filter.
    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point)
    }
}

impl fmt::Display for GeometryCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point => f.write_str("Point"),
            Self::Other(kind) => f.write_str(kind),
            Self::Empty => f.write_str("empty"),
            Self::NullGeometry => f.write_str("null geometry"),
        }
    }
}

/// Classifies the first geometry of `dataset`.
///
/// # Errors
///
/// Returns an error if the first geometry cannot be decoded.
pub fn first_geometry_type(dataset: &Dataset) -> Result<GeometryCheck> {
    if dataset.num_rows() == 0 {
        return Ok(GeometryCheck::Empty);
    }
    Ok(match dataset.geometry(0)? {
        None => GeometryCheck::NullGeometry,
        Some(Geometry::Point(_)) => GeometryCheck::Point,
        Some(other) => GeometryCheck::Other(geometry_type_name(&other)),
    })
}

/// A dataset dropped by the point filter.
#[derive(Debug)]
pub struct Rejected {
    /// The dataset that was dropped
    pub dataset: Dataset,
    /// Why it was dropped
    pub check: GeometryCheck,
}

/// Outcome of filtering a set of datasets.
#[derive(Debug, Default)]
pub struct FilterResult {
    /// Datasets whose first geometry is a point, in input order
    pub retained: Vec<Dataset>,
    /// Datasets dropped because their first geometry is not a point
    pub skipped: Vec<Rejected>,
    /// Datasets whose first geometry could not be decoded
    pub failed: Vec<(Dataset, crate::error::CollateError)>,
}

/// Splits `datasets` into point datasets and the rest.
#[must_use]
pub fn retain_point_datasets(datasets: Vec<Dataset>) -> FilterResult {
    let mut result = FilterResult::default();
    for dataset in datasets {
        match first_geometry_type(&dataset) {
            Ok(GeometryCheck::Point) => result.retained.push(dataset),
            Ok(check) => {
                info!(
                    "Skipping {}: first geometry is {check}, not Point",
                    dataset.source().display()
                );
                result.skipped.push(Rejected { dataset, check });
            },
            Err(e) => result.failed.push((dataset, e)),
        }
    }
    result
}
