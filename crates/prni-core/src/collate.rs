//! Concatenation of normalized datasets into one canonical dataset.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, RecordBatch};
use arrow::compute::{cast, concat_batches, filter_record_batch};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use log::info;
use prni_core_common::dataset::geometry_field;
use prni_core_common::{Crs, Dataset, GEOMETRY_COLUMN};

use crate::countries::CountryCode;
use crate::error::{CollationError, Result, SchemaError};
use crate::normalize::DEPTH_COLUMN;

/// Schema of every collated output: `depth` then `geometry`.
#[must_use]
pub fn canonical_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(DEPTH_COLUMN, DataType::Float64, true),
        geometry_field(GEOMETRY_COLUMN),
    ]))
}

/// Projects a normalized dataset to `{depth, geometry}`, casting depth to
/// `Float64`. Values that cannot be cast become null.
fn project(country: CountryCode, dataset: &Dataset, schema: &SchemaRef) -> Result<RecordBatch> {
    let arrow_err = |source: ArrowError| CollationError::Arrow { country, source };
    let batch = dataset.batch();
    let depth_index = batch
        .schema()
        .index_of(DEPTH_COLUMN)
        .map_err(|_| SchemaError::MissingDepthColumn {
            path: dataset.source().to_path_buf(),
            columns: dataset.column_names().join(", "),
        })?;
    let depth = cast(batch.column(depth_index), &DataType::Float64).map_err(arrow_err)?;
    let geometry: ArrayRef = Arc::clone(batch.column(dataset.geometry_index()));
    Ok(RecordBatch::try_new(Arc::clone(schema), vec![depth, geometry]).map_err(arrow_err)?)
}

/// Rows whose depth is present and not NaN and whose geometry is present.
fn complete_rows(batch: &RecordBatch) -> BooleanArray {
    let depth = batch.column(0).as_primitive::<Float64Type>();
    let geometry = batch.column(1);
    (0..batch.num_rows())
        .map(|i| Some(depth.is_valid(i) && !depth.value(i).is_nan() && geometry.is_valid(i)))
        .collect()
}

/// Concatenates `datasets` in order into a canonical dataset for `country`.
///
/// Every input must already be normalized (a `depth` column) and in
/// EPSG:4326. The result holds exactly the `depth` and `geometry` columns and
/// no row with a missing value.
///
/// # Errors
///
/// Returns [`CollationError::NothingToCollate`] for an empty input, a schema
/// error when an input has no `depth` column, or an Arrow error if the
/// batches cannot be combined.
pub fn collate(country: CountryCode, datasets: &[Dataset]) -> Result<Dataset> {
    if datasets.is_empty() {
        return Err(CollationError::NothingToCollate {
            country,
            skipped: 0,
            failed: 0,
        }
        .into());
    }
    let arrow_err = |source: ArrowError| CollationError::Arrow { country, source };

    let schema = canonical_schema();
    let batches = datasets
        .iter()
        .map(|d| project(country, d, &schema))
        .collect::<Result<Vec<_>>>()?;
    let combined = concat_batches(&schema, &batches).map_err(arrow_err)?;
    let mask = complete_rows(&combined);
    let collated = filter_record_batch(&combined, &mask).map_err(arrow_err)?;

    let dropped = combined.num_rows() - collated.num_rows();
    info!(
        "{country}: collated {} feature(s) from {} dataset(s), dropped {dropped} incomplete row(s)",
        collated.num_rows(),
        datasets.len()
    );
    Ok(Dataset::try_new(
        country.as_str(),
        collated,
        1,
        Some(Crs::WGS84),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollateError;
    use arrow::array::{BinaryArray, Float64Array, StringArray};
    use geo_types::{Geometry, point};
    use prni_core_common::geometry::encode_wkb;

    fn wkb(x: f64, y: f64) -> Vec<u8> {
        encode_wkb(&Geometry::Point(point!(x: x, y: y))).unwrap()
    }

    fn normalized(depth: ArrayRef, geometries: Vec<Option<Vec<u8>>>) -> Dataset {
        let rows = geometries.len();
        let schema = Schema::new(vec![
            Field::new("survey", DataType::Utf8, true),
            Field::new("depth", depth.data_type().clone(), true),
            geometry_field("geometry"),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["s"; rows])),
                depth,
                Arc::new(BinaryArray::from_iter(geometries)),
            ],
        )
        .unwrap();
        Dataset::try_new("n.shp", batch, 2, Some(Crs::WGS84)).unwrap()
    }

    #[test]
    fn test_collate_keeps_two_complete_columns() {
        let first = normalized(
            Arc::new(Float64Array::from(vec![Some(10.0), None, Some(f64::NAN)])),
            vec![Some(wkb(1.0, 1.0)), Some(wkb(2.0, 2.0)), Some(wkb(3.0, 3.0))],
        );
        let second = normalized(
            Arc::new(Float64Array::from(vec![Some(20.0), Some(30.0)])),
            vec![None, Some(wkb(5.0, 5.0))],
        );

        let collated = collate(CountryCode::Tonga, &[first, second]).unwrap();

        assert_eq!(collated.column_names(), vec!["depth", "geometry"]);
        assert_eq!(collated.crs(), Some(&Crs::WGS84));
        assert_eq!(collated.num_rows(), 2);
        let depth = collated.batch().column(0).as_primitive::<Float64Type>();
        assert_eq!(depth.null_count(), 0);
        assert_eq!(depth.values().to_vec(), vec![10.0, 30.0]);
        assert_eq!(collated.geometries().unwrap().null_count(), 0);
        assert_eq!(
            collated.geometry(1).unwrap(),
            Some(Geometry::Point(point!(x: 5.0, y: 5.0)))
        );
    }

    #[test]
    fn test_text_depth_is_cast_and_unparseable_dropped() {
        let dataset = normalized(
            Arc::new(StringArray::from(vec!["12.5", "n/a", "7"])),
            vec![Some(wkb(1.0, 1.0)), Some(wkb(2.0, 2.0)), Some(wkb(3.0, 3.0))],
        );

        let collated = collate(CountryCode::Niue, &[dataset]).unwrap();
        let depth = collated.batch().column(0).as_primitive::<Float64Type>();
        assert_eq!(depth.values().to_vec(), vec![12.5, 7.0]);
    }

    #[test]
    fn test_empty_input_is_nothing_to_collate() {
        let err = collate(CountryCode::Nauru, &[]).unwrap_err();
        assert!(matches!(
            err,
            CollateError::Collate(CollationError::NothingToCollate { .. })
        ));
    }

    #[test]
    fn test_input_without_depth_column_is_rejected() {
        let schema = Schema::new(vec![geometry_field("geometry")]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(BinaryArray::from_iter(vec![Some(wkb(0.0, 0.0))]))],
        )
        .unwrap();
        let dataset = Dataset::try_new("raw.shp", batch, 0, Some(Crs::WGS84)).unwrap();

        let err = collate(CountryCode::Fiji, &[dataset]).unwrap_err();
        assert!(matches!(
            err,
            CollateError::Schema(SchemaError::MissingDepthColumn { .. })
        ));
    }
}
