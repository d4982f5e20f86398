//! Column name normalization.
//!
//! Source shapefiles name their columns inconsistently (`Depth_m`, `DEPTH`,
//! `dep_lat`, ...). [`normalize_schema`] brings every dataset to a common
//! layout: lower-case names, a `geometry` column and a `depth` column.

use log::{debug, warn};
use prni_core_common::{Dataset, GEOMETRY_COLUMN};

use crate::error::{Result, SchemaError};

/// Canonical name of the depth column.
pub const DEPTH_COLUMN: &str = "depth";

/// Column used when no name identifies the depth column.
pub const FALLBACK_DEPTH_INDEX: usize = 2;

/// How the depth column of a dataset was identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepthColumn {
    /// Matched by name; holds the source column name.
    Found(String),
    /// No name matched; the column at this index is used.
    FallbackUsed(usize),
    /// Neither a name nor the fallback position is usable.
    NotFound,
}

/// Identifies the depth column among `columns`.
///
/// Preference order: a column named `depth` (any case), then the first column
/// whose lower-cased name starts with `prefix`, then the column at
/// [`FALLBACK_DEPTH_INDEX`]. The geometry column is never selected.
/// `prefix` must already be lower-case.
#[must_use]
pub fn detect_depth_column(columns: &[String], geometry_index: usize, prefix: &str) -> DepthColumn {
    let candidates = || {
        columns
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != geometry_index)
    };

    if let Some((_, name)) = candidates().find(|(_, n)| n.eq_ignore_ascii_case(DEPTH_COLUMN)) {
        return DepthColumn::Found(name.clone());
    }
    if let Some((_, name)) = candidates().find(|(_, n)| n.to_lowercase().starts_with(prefix)) {
        return DepthColumn::Found(name.clone());
    }
    if FALLBACK_DEPTH_INDEX < columns.len() && FALLBACK_DEPTH_INDEX != geometry_index {
        return DepthColumn::FallbackUsed(FALLBACK_DEPTH_INDEX);
    }
    DepthColumn::NotFound
}

/// Normalizes column names of `dataset`.
///
/// Names are lower-cased, the geometry column is renamed to `geometry` and
/// the column picked by [`detect_depth_column`] is renamed to `depth`. Other
/// prefix matches keep their names. Returns the renamed dataset with the
/// detection result.
///
/// # Errors
///
/// Returns [`SchemaError::MissingDepthColumn`] when no depth column can be
/// identified.
pub fn normalize_schema(dataset: Dataset, prefix: &str) -> Result<(Dataset, DepthColumn)> {
    let source = dataset.source().to_path_buf();
    let geometry_index = dataset.geometry_index();
    let original = dataset.column_names();
    let detection = detect_depth_column(&original, geometry_index, prefix);

    let depth_index = match &detection {
        DepthColumn::Found(name) => {
            debug!("{}: depth column is '{name}'", source.display());
            original.iter().position(|n| n == name)
        },
        DepthColumn::FallbackUsed(index) => {
            warn!(
                "{}: no column matches '{prefix}*', using column {index} ('{}') as depth",
                source.display(),
                original[*index]
            );
            Some(*index)
        },
        DepthColumn::NotFound => None,
    };
    let Some(depth_index) = depth_index else {
        return Err(SchemaError::MissingDepthColumn {
            path: source,
            columns: original.join(", "),
        }
        .into());
    };

    for (i, name) in original.iter().enumerate() {
        if i != depth_index && i != geometry_index && name.to_lowercase().starts_with(prefix) {
            warn!(
                "{}: column '{name}' also matches '{prefix}*' and keeps its name",
                source.display()
            );
        }
    }

    let dataset = dataset.map_column_names(|i, name| {
        if i == geometry_index {
            GEOMETRY_COLUMN.to_string()
        } else if i == depth_index {
            DEPTH_COLUMN.to_string()
        } else {
            name.to_lowercase()
        }
    })?;
    Ok((dataset, detection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{BinaryArray, Float64Array, RecordBatch, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use prni_core_common::dataset::geometry_field;

    use crate::error::CollateError;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn dataset(columns: &[&str], geometry_index: usize) -> Dataset {
        let fields: Vec<Field> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if i == geometry_index {
                    geometry_field(name)
                } else if i % 2 == 0 {
                    Field::new(*name, DataType::Float64, true)
                } else {
                    Field::new(*name, DataType::Utf8, true)
                }
            })
            .collect();
        let arrays: Vec<arrow::array::ArrayRef> = fields
            .iter()
            .map(|f| -> arrow::array::ArrayRef {
                match f.data_type() {
                    DataType::Binary => Arc::new(BinaryArray::from_opt_vec(vec![None])),
                    DataType::Float64 => Arc::new(Float64Array::from(vec![1.0])),
                    _ => Arc::new(StringArray::from(vec!["x"])),
                }
            })
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap();
        Dataset::try_new("survey.shp", batch, geometry_index, None).unwrap()
    }

    #[test]
    fn test_prefix_match_renames_depth_m() {
        let (normalized, detection) =
            normalize_schema(dataset(&["ID", "Depth_m", "geometry"], 2), "dep").unwrap();
        assert_eq!(detection, DepthColumn::Found("Depth_m".to_string()));
        assert_eq!(normalized.column_names(), vec!["id", "depth", "geometry"]);
    }

    #[test]
    fn test_fallback_to_index_two() {
        let (normalized, detection) = normalize_schema(
            dataset(&["Survey", "Name", "Sounding", "SHAPE"], 3),
            "dep",
        )
        .unwrap();
        assert_eq!(detection, DepthColumn::FallbackUsed(2));
        assert_eq!(
            normalized.column_names(),
            vec!["survey", "name", "depth", "geometry"]
        );
    }

    #[test]
    fn test_geometry_column_renamed() {
        let (normalized, _) =
            normalize_schema(dataset(&["SHAPE", "DEPTH", "Q"], 0), "dep").unwrap();
        assert_eq!(normalized.geometry_column(), "geometry");
        assert_eq!(normalized.column_names(), vec!["geometry", "depth", "q"]);
    }

    #[test]
    fn test_first_prefix_match_wins() {
        let columns = names(&["id", "Dep_Lat", "DepthVal", "geometry"]);
        assert_eq!(
            detect_depth_column(&columns, 3, "dep"),
            DepthColumn::Found("Dep_Lat".to_string())
        );
        let (normalized, _) =
            normalize_schema(dataset(&["id", "Dep_Lat", "DepthVal", "geometry"], 3), "dep")
                .unwrap();
        assert_eq!(
            normalized.column_names(),
            vec!["id", "depth", "depthval", "geometry"]
        );
    }

    #[test]
    fn test_exact_depth_name_preferred_over_prefix() {
        let columns = names(&["Departure", "DEPTH", "geometry"]);
        assert_eq!(
            detect_depth_column(&columns, 2, "dep"),
            DepthColumn::Found("DEPTH".to_string())
        );
    }

    #[test]
    fn test_longer_prefix_skips_short_matches() {
        let columns = names(&["dep_lat", "dept_m", "geometry"]);
        assert_eq!(
            detect_depth_column(&columns, 2, "dept"),
            DepthColumn::Found("dept_m".to_string())
        );
    }

    #[test]
    fn test_fallback_never_selects_geometry() {
        let columns = names(&["a", "b", "geometry"]);
        assert_eq!(detect_depth_column(&columns, 2, "dep"), DepthColumn::NotFound);

        let columns = names(&["a", "geometry"]);
        assert_eq!(detect_depth_column(&columns, 1, "dep"), DepthColumn::NotFound);
    }

    #[test]
    fn test_not_found_is_missing_depth_error() {
        let err = normalize_schema(dataset(&["a", "geometry"], 1), "dep").unwrap_err();
        assert!(matches!(
            err,
            CollateError::Schema(SchemaError::MissingDepthColumn { .. })
        ));
        assert!(err.to_string().contains("survey.shp"));
    }
}
