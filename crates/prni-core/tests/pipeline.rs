use std::path::Path;
use std::sync::Arc;

use arrow::array::{AsArray, BinaryArray, Float64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use geo_types::Geometry;
use prni_core::crs::proj4_definition;
use prni_core::error::{CollationError, CrsError};
use prni_core::{
    CollateError, CollateOptions, CountryCode, Crs, Dataset, DatasetReader, FileErrorPolicy,
    Pipeline, Variant, collate_all, inspect,
};
use prni_core_common::dataset::geometry_field;
use prni_core_common::geometry::encode_wkb;
use prni_gpkg::{GpkgWriter, read_gpkg};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

const FIJI_PRJ: &str = r#"PROJCS["Fiji_1986_Fiji_Map_Grid",GEOGCS["GCS_Fiji_1986",DATUM["D_Fiji_1986",SPHEROID["WGS_1972",6378135.0,298.26]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",2000000.0],PARAMETER["False_Northing",4000000.0],PARAMETER["Central_Meridian",178.75],PARAMETER["Scale_Factor",0.99985],PARAMETER["Latitude_Of_Origin",-17.0],UNIT["Meter",1.0]]"#;

fn table() -> TableWriterBuilder {
    TableWriterBuilder::new()
        .add_character_field(FieldName::try_from("Survey").unwrap(), 20)
        .add_numeric_field(FieldName::try_from("Depth_m").unwrap(), 10, 2)
}

fn record(depth: Option<f64>) -> Record {
    let mut record = Record::default();
    record.insert(
        "Survey".to_string(),
        FieldValue::Character(Some("PRNI".to_string())),
    );
    record.insert("Depth_m".to_string(), FieldValue::Numeric(depth));
    record
}

fn write_prj(shp: &Path, prj: Option<&str>) {
    if let Some(prj) = prj {
        std::fs::write(shp.with_extension("prj"), prj).unwrap();
    }
}

fn write_points(shp: &Path, points: &[(f64, f64, Option<f64>)], prj: Option<&str>) {
    std::fs::create_dir_all(shp.parent().unwrap()).unwrap();
    {
        let mut writer = shapefile::Writer::from_path(shp, table()).unwrap();
        for &(x, y, depth) in points {
            writer
                .write_shape_and_record(&Point::new(x, y), &record(depth))
                .unwrap();
        }
    }
    write_prj(shp, prj);
}

fn write_polygon(shp: &Path, prj: Option<&str>) {
    std::fs::create_dir_all(shp.parent().unwrap()).unwrap();
    {
        let mut writer = shapefile::Writer::from_path(shp, table()).unwrap();
        let ring = PolygonRing::Outer(vec![
            Point::new(2_000_000.0, 4_000_000.0),
            Point::new(2_000_000.0, 4_000_100.0),
            Point::new(2_000_100.0, 4_000_100.0),
            Point::new(2_000_100.0, 4_000_000.0),
            Point::new(2_000_000.0, 4_000_000.0),
        ]);
        writer
            .write_shape_and_record(&Polygon::new(ring), &record(Some(50.0)))
            .unwrap();
    }
    write_prj(shp, prj);
}

fn depths(dataset: &Dataset) -> Vec<f64> {
    let index = dataset
        .column_names()
        .iter()
        .position(|n| n == "depth")
        .unwrap();
    dataset
        .batch()
        .column(index)
        .as_primitive::<Float64Type>()
        .values()
        .to_vec()
}

#[test]
fn test_points_variant_collates_fiji_with_override() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("PRNI_DATA");
    let bathy = root.join("FJ").join("Bathy_shp");
    // Declared CRS is WGS84, but the FJ override forces EPSG:3460
    write_points(
        &bathy.join("lau").join("soundings.shp"),
        &[
            (2_000_000.0, 4_000_000.0, Some(12.5)),
            (2_000_050.0, 4_000_050.0, None),
            (2_000_100.0, 4_000_100.0, Some(40.0)),
        ],
        Some(WGS84_PRJ),
    );
    write_polygon(&bathy.join("contours.shp"), Some(FIJI_PRJ));

    let config = CollateOptions::default()
        .with_root_path(&root)
        .with_output_dir(dir.path().join("data"))
        .with_countries(vec![CountryCode::Fiji])
        .build()
        .unwrap();
    let summary = collate_all(config);

    let report = &summary.reports[0];
    assert!(report.is_success(), "{:?}", report.outcome);
    assert_eq!(report.files_found, 2);
    assert_eq!(report.files_collated, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].path.ends_with("contours.shp"));
    assert!(report.failures.is_empty());

    let output = dir.path().join("data").join("FJ.gpkg");
    let written = read_gpkg(&output, Some("prni")).unwrap();
    assert_eq!(written.num_rows(), 2);
    assert_eq!(written.crs(), Some(&Crs::WGS84));
    assert_eq!(depths(&written), vec![12.5, 40.0]);
    for row in 0..written.num_rows() {
        match written.geometry(row).unwrap() {
            Some(Geometry::Point(p)) => {
                assert!((p.x() - 178.75).abs() < 1e-2, "x = {}", p.x());
                assert!((p.y() + 17.0).abs() < 1e-2, "y = {}", p.y());
            },
            other => panic!("expected a point, got {other:?}"),
        }
    }
}

#[test]
fn test_missing_crs_is_reported_and_other_files_continue() {
    let dir = tempfile::tempdir().unwrap();
    let bathy = dir.path().join("TO").join("Bathy_shp");
    write_points(
        &bathy.join("a.shp"),
        &[(-175.2, -21.1, Some(8.0))],
        Some(WGS84_PRJ),
    );
    write_points(&bathy.join("b.shp"), &[(-175.3, -21.2, Some(9.0))], None);

    let config = CollateOptions::default()
        .with_root_path(dir.path())
        .with_output_dir(dir.path().join("out"))
        .with_countries(vec![CountryCode::Tonga])
        .build()
        .unwrap();
    let summary = collate_all(config);

    let report = &summary.reports[0];
    assert_eq!(report.status(), "partial");
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("b.shp"));
    assert!(matches!(
        report.failures[0].error,
        CollateError::Crs(CrsError::MissingCrs {
            country: CountryCode::Tonga,
            ..
        })
    ));

    let written = read_gpkg(&dir.path().join("out").join("TO.gpkg"), None).unwrap();
    assert_eq!(depths(&written), vec![8.0]);
    assert!(!summary.has_failures());
}

#[test]
fn test_abort_country_policy_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let bathy = dir.path().join("TO").join("Bathy_shp");
    write_points(
        &bathy.join("a.shp"),
        &[(-175.2, -21.1, Some(8.0))],
        Some(WGS84_PRJ),
    );
    write_points(&bathy.join("b.shp"), &[(-175.3, -21.2, Some(9.0))], None);

    let config = CollateOptions::default()
        .with_root_path(dir.path())
        .with_output_dir(dir.path().join("out"))
        .with_countries(vec![CountryCode::Tonga, CountryCode::Niue])
        .with_on_file_error(FileErrorPolicy::AbortCountry)
        .build()
        .unwrap();
    let summary = collate_all(config);

    assert_eq!(summary.reports.len(), 2);
    assert!(matches!(
        summary.reports[0].outcome,
        Err(CollateError::Crs(CrsError::MissingCrs { .. }))
    ));
    assert!(matches!(
        summary.reports[1].outcome,
        Err(CollateError::Collate(CollationError::NoInputFiles { .. }))
    ));
    assert!(!dir.path().join("out").join("TO.gpkg").exists());
    assert_eq!(summary.succeeded(), 0);
}

#[test]
fn test_all_geometries_variant_keeps_polygons_and_declared_crs() {
    let dir = tempfile::tempdir().unwrap();
    let bathy = dir.path().join("FJ").join("Bathy_shp");
    write_points(
        &bathy.join("a_points.shp"),
        &[(2_000_000.0, 4_000_000.0, Some(5.0))],
        Some(FIJI_PRJ),
    );
    write_polygon(&bathy.join("b_contours.shp"), Some(FIJI_PRJ));

    let config = CollateOptions::default()
        .with_root_path(dir.path())
        .with_output_dir(dir.path().join("out"))
        .with_countries(vec![CountryCode::Fiji])
        .with_variant(Variant::AllGeometries)
        .with_depth_prefix("depth")
        .build()
        .unwrap();
    let summary = collate_all(config);

    let report = &summary.reports[0];
    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(report.skipped.is_empty());

    let written = read_gpkg(&dir.path().join("out").join("FJ.gpkg"), None).unwrap();
    assert_eq!(written.num_rows(), 2);
    assert_eq!(depths(&written), vec![5.0, 50.0]);
    assert!(matches!(
        written.geometry(1).unwrap(),
        Some(Geometry::Polygon(_) | Geometry::MultiPolygon(_))
    ));
}

/// Serves datasets from memory, keyed by file stem.
struct MemoryReader;

impl DatasetReader for MemoryReader {
    fn format_name(&self) -> &'static str {
        "memory"
    }

    fn read_dataset(&self, path: &Path) -> anyhow::Result<Dataset> {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let point = |x: f64, y: f64| {
            encode_wkb(&Geometry::Point(geo_types::point!(x: x, y: y))).unwrap()
        };
        let geometries = BinaryArray::from_vec(vec![
            point(-172.0, -13.8).as_slice(),
            point(-171.9, -13.9).as_slice(),
        ]);
        match stem {
            // no depth-like name: column 2 is used
            "positional" => {
                let schema = Schema::new(vec![
                    Field::new("Survey", DataType::Utf8, true),
                    Field::new("Name", DataType::Utf8, true),
                    Field::new("Z", DataType::Float64, true),
                    geometry_field("SHAPE"),
                ]);
                let batch = RecordBatch::try_new(
                    Arc::new(schema),
                    vec![
                        Arc::new(StringArray::from(vec!["s", "s"])),
                        Arc::new(StringArray::from(vec!["n", "n"])),
                        Arc::new(Float64Array::from(vec![3.0, 4.0])),
                        Arc::new(geometries),
                    ],
                )?;
                Ok(Dataset::try_new(path, batch, 3, Some(Crs::WGS84))?)
            },
            "too_narrow" => {
                let schema = Schema::new(vec![
                    Field::new("Survey", DataType::Utf8, true),
                    geometry_field("geometry"),
                ]);
                let batch = RecordBatch::try_new(
                    Arc::new(schema),
                    vec![
                        Arc::new(StringArray::from(vec!["s", "s"])),
                        Arc::new(geometries),
                    ],
                )?;
                Ok(Dataset::try_new(path, batch, 1, Some(Crs::WGS84))?)
            },
            other => anyhow::bail!("no fixture named {other}"),
        }
    }
}

#[test]
fn test_custom_reader_with_positional_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let bathy = dir.path().join("WS").join("Bathy_shp");
    std::fs::create_dir_all(&bathy).unwrap();
    for name in ["positional.shp", "too_narrow.shp", "unknown.shp"] {
        std::fs::write(bathy.join(name), b"").unwrap();
    }

    let config = CollateOptions::default()
        .with_root_path(dir.path())
        .with_output_dir(dir.path().join("out"))
        .with_countries(vec![CountryCode::Samoa])
        .build()
        .unwrap();
    let pipeline = Pipeline::with_io(config, MemoryReader, GpkgWriter);
    let report = pipeline.collate_country(CountryCode::Samoa);

    assert_eq!(report.files_found, 3);
    assert_eq!(report.files_collated, 1);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().any(|f| f.path.ends_with("too_narrow.shp")));
    assert!(report.failures.iter().any(|f| f.path.ends_with("unknown.shp")));

    let written = read_gpkg(&dir.path().join("out").join("WS.gpkg"), Some("prni")).unwrap();
    assert_eq!(depths(&written), vec![3.0, 4.0]);
    assert_eq!(written.crs(), Some(&Crs::WGS84));
}

#[test]
fn test_config_file_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_points(
        &dir.path().join("NU").join("soundings").join("n.shp"),
        &[(-169.9, -19.05, Some(21.0))],
        Some(WGS84_PRJ),
    );
    let config_path = dir.path().join("prni.json");
    let json = serde_json::json!({
        "root_path": dir.path(),
        "output_dir": dir.path().join("gpkg"),
        "countries": ["nu"],
        "input_subdir": "soundings",
        "layer_name": "depths",
    });
    std::fs::write(&config_path, json.to_string()).unwrap();

    let config = CollateOptions::from_json_file(&config_path)
        .unwrap()
        .build()
        .unwrap();
    let summary = collate_all(config);
    assert!(!summary.has_failures());
    assert_eq!(summary.total_features(), 1);

    let written = read_gpkg(&dir.path().join("gpkg").join("NU.gpkg"), Some("depths")).unwrap();
    assert_eq!(written.num_rows(), 1);
}

#[test]
fn test_inspect_reports_depth_detection() {
    let dir = tempfile::tempdir().unwrap();
    let shp = dir.path().join("soundings.shp");
    write_points(&shp, &[(1.0, 2.0, Some(3.0))], Some(FIJI_PRJ));

    let info = inspect(&shp, "dep").unwrap();
    assert_eq!(info.driver, "ESRI Shapefile");
    assert_eq!(info.feature_count, 1);
    assert_eq!(info.geometry_column.crs.as_deref(), Some("EPSG:3460"));
    assert_eq!(info.depth_column_label(), "Depth_m (name match)");
    assert_eq!(info.fields.len(), 2);
    assert_eq!(info.geometry_column.first_geometry.to_string(), "Point");
}

#[test]
fn test_override_codes_have_definitions() {
    for code in [3460, 32760, 4326] {
        assert!(proj4_definition(code).is_ok(), "EPSG:{code}");
    }
}
