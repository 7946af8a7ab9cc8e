//! End-to-end coverage runs: KML in, GeoParquet out.

use std::fs::File;

use arrow::array::{Array, BinaryArray, BooleanArray, StringArray, UInt8Array};
use coverage::{
    load_acquisitions, load_grid, load_ground_tracks, write_parquet, CoverageConfig,
    CoverageEngine, ExistenceFilter, SkipReason,
};
use geo::Area;
use mgrs_common::RelativeOrbit;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use test_utils::{
    acquisition_placemark, grid_placemark, kml_document, meridian_track, rect_ring, square_ring,
    temp_test_dir, track_placemark,
};

fn grid_kml() -> String {
    kml_document(
        "Features",
        &[
            grid_placemark("33UUU", &[square_ring(14.5, 52.0, 1.0)]),
            grid_placemark("33UUV", &[square_ring(14.5, 53.0, 1.0)]),
            grid_placemark("32UNU", &[square_ring(8.5, 52.0, 1.0)]),
            grid_placemark("01UCU", &[square_ring(-177.5, 52.0, 1.0)]),
            grid_placemark("60UXU", &[square_ring(177.0, 52.0, 1.0)]),
            grid_placemark("60CWS", &[square_ring(177.0, -80.0, 1.0)]),
        ],
    )
}

fn tracks_kml() -> String {
    kml_document(
        "Tracks",
        &[
            track_placemark(22, &meridian_track(14.5, 40.0, 60.0, 20)),
            track_placemark(65, &meridian_track(14.8, 40.0, 60.0, 20)),
            track_placemark(108, &meridian_track(14.2, 40.0, 60.0, 20)),
            track_placemark(7, &meridian_track(40.0, 40.0, 60.0, 20)),
            track_placemark(50, &meridian_track(8.6, 40.0, 60.0, 20)),
            track_placemark(51, &meridian_track(-177.0, 40.0, 60.0, 20)),
        ],
    )
}

#[test]
fn test_join_orbits_end_to_end() {
    let dir = temp_test_dir();
    let grid = dir.path().join("grid.kml");
    let tracks = dir.path().join("tracks.kml");
    std::fs::write(&grid, grid_kml()).unwrap();
    std::fs::write(&tracks, tracks_kml()).unwrap();

    let config = CoverageConfig::default();
    let tiles = load_grid(&grid, &config.grid_layer).unwrap();
    let tracks = load_ground_tracks(&tracks, None, &config.orbit_field).unwrap();
    let run = CoverageEngine::new(config).unwrap().run(&tiles, &tracks).unwrap();

    // Antimeridian zones never produce records and are always reported
    assert!(run.records.iter().all(|r| r.zone.zone != 1 && r.zone.zone != 60));
    let skipped: Vec<String> = run.skipped.iter().map(|s| s.key.to_string()).collect();
    assert_eq!(skipped, vec!["01N", "60S", "60N"]);
    assert!(run.skipped.iter().all(|s| s.reason == SkipReason::Antimeridian));

    // Orbit 7 runs 25 degrees east of zone 33
    assert!(run.records.iter().all(|r| r.orbit != RelativeOrbit(7)));

    let pairs: Vec<(String, u8)> = run
        .records
        .iter()
        .map(|r| (r.tile_id.to_string(), r.orbit.0))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("32UNU".to_string(), 50),
            ("33UUU".to_string(), 22),
            ("33UUU".to_string(), 65),
            ("33UUU".to_string(), 108),
            ("33UUV".to_string(), 22),
            ("33UUV".to_string(), 65),
            ("33UUV".to_string(), 108),
        ]
    );

    // Orbit 22 runs down the middle of 33UUU, so its swath holds the whole tile
    let full = run
        .records
        .iter()
        .find(|r| r.tile_id.as_str() == "33UUU" && r.orbit.0 == 22)
        .unwrap();
    let tile = tiles.iter().find(|t| t.id.as_str() == "33UUU").unwrap();
    assert!((full.geometry.unsigned_area() - tile.geometry.unsigned_area()).abs() < 1e-6);
}

#[test]
fn test_existence_filter_restricts_orbits() {
    let dir = temp_test_dir();
    let grid = dir.path().join("grid.kml");
    let tracks = dir.path().join("tracks.kml");
    let filter_path = dir.path().join("filter.json");
    std::fs::write(&grid, grid_kml()).unwrap();
    std::fs::write(&tracks, tracks_kml()).unwrap();
    std::fs::write(&filter_path, r#"{"33UUU": [22, 65], "33UUV": [108]}"#).unwrap();

    let config = CoverageConfig::default();
    let tiles = load_grid(&grid, &config.grid_layer).unwrap();
    let tracks = load_ground_tracks(&tracks, None, &config.orbit_field).unwrap();
    let filter = ExistenceFilter::from_path(&filter_path).unwrap();

    let run = CoverageEngine::new(config)
        .unwrap()
        .with_filter(filter)
        .run(&tiles, &tracks)
        .unwrap();

    let orbits_33uuu: Vec<u8> = run
        .records
        .iter()
        .filter(|r| r.tile_id.as_str() == "33UUU")
        .map(|r| r.orbit.0)
        .collect();
    assert_eq!(orbits_33uuu, vec![22, 65]);

    // Tiles absent from the filter produce nothing
    assert!(run.records.iter().all(|r| r.tile_id.as_str() != "32UNU"));
}

#[test]
fn test_acquisitions_to_parquet() {
    let dir = temp_test_dir();
    let grid = dir.path().join("grid.kml");
    let plan = dir.path().join("plan.kml");
    std::fs::write(&grid, grid_kml()).unwrap();
    std::fs::write(
        &plan,
        kml_document(
            "NOMINAL",
            &[
                acquisition_placemark("10", 22, &rect_ring(13.0, 51.5, 17.0, 52.5)),
                acquisition_placemark("11", 22, &rect_ring(13.0, 52.5, 17.0, 53.5)),
                acquisition_placemark("12", 65, &rect_ring(14.0, 53.8, 16.0, 54.5)),
            ],
        ),
    )
    .unwrap();

    let config = CoverageConfig::default();
    let tiles = load_grid(&grid, &config.grid_layer).unwrap();
    let segments = load_acquisitions(&[plan], &config.acquisition_layer).unwrap();
    let run = CoverageEngine::new(config).unwrap().run(&tiles, &segments).unwrap();

    // Segments 10 and 11 both touch 33UUU and are dissolved into one record
    let pairs: Vec<(String, u8)> = run
        .records
        .iter()
        .map(|r| (r.tile_id.to_string(), r.orbit.0))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("33UUU".to_string(), 22),
            ("33UUV".to_string(), 22),
            ("33UUV".to_string(), 65),
        ]
    );

    let out = dir.path().join("out").join("coverage.parquet");
    assert_eq!(write_parquet(&out, &run.records).unwrap(), 3);

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&out).unwrap()).unwrap();
    let geo = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|k| k.key == "geo"))
        .and_then(|k| k.value.clone())
        .unwrap();
    let geo: serde_json::Value = serde_json::from_str(&geo).unwrap();
    assert_eq!(geo["primary_column"], "geometry");
    assert_eq!(geo["columns"]["geometry"]["encoding"], "WKB");

    let batches: Vec<_> = builder.build().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 3);

    let tile_ids = batch
        .column_by_name("tile_id")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    let zones = batch
        .column_by_name("utm_zone")
        .unwrap()
        .as_any()
        .downcast_ref::<UInt8Array>()
        .unwrap();
    let northern = batch
        .column_by_name("is_northern")
        .unwrap()
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap();
    let orbits = batch
        .column_by_name("relative_orbit")
        .unwrap()
        .as_any()
        .downcast_ref::<UInt8Array>()
        .unwrap();
    let geometries = batch
        .column_by_name("geometry")
        .unwrap()
        .as_any()
        .downcast_ref::<BinaryArray>()
        .unwrap();

    assert_eq!(tile_ids.value(0), "33UUU");
    assert_eq!(zones.value(0), 33);
    assert!(northern.value(0));
    assert_eq!(orbits.value(2), 65);
    assert_eq!(geometries.null_count(), 0);
    // Little-endian MultiPolygon header
    assert_eq!(&geometries.value(0)[..5], &[1, 6, 0, 0, 0]);
}

#[test]
fn test_empty_run_writes_schema_only_file() {
    let dir = temp_test_dir();
    let out = dir.path().join("empty.parquet");
    assert_eq!(write_parquet(&out, &[]).unwrap(), 0);

    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&out).unwrap()).unwrap();
    assert_eq!(builder.schema().fields().len(), 5);
    assert_eq!(builder.metadata().file_metadata().num_rows(), 0);
}
