//! GeoParquet output of coverage records.
//!
//! Columns: `tile_id` (utf8), `geometry` (WKB, lon/lat), `utm_zone` (uint8),
//! `is_northern` (bool), `relative_orbit` (uint8). The file-level `geo`
//! key carries GeoParquet 1.0 metadata for the geometry column.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BinaryArray, BooleanArray, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use geo::BoundingRect;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::ops::combined_rect;
use crate::types::CoverageRecord;
use crate::wkb::encode_multipolygon;

pub const GEOMETRY_COLUMN: &str = "geometry";

/// Arrow schema of the coverage table.
pub fn coverage_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("tile_id", DataType::Utf8, false),
        Field::new(GEOMETRY_COLUMN, DataType::Binary, false),
        Field::new("utm_zone", DataType::UInt8, false),
        Field::new("is_northern", DataType::Boolean, false),
        Field::new("relative_orbit", DataType::UInt8, false),
    ]))
}

/// Convert records into one Arrow batch.
pub fn records_to_batch(records: &[CoverageRecord]) -> Result<RecordBatch> {
    let tile_ids: Vec<&str> = records.iter().map(|r| r.tile_id.as_str()).collect();
    let geometries: Vec<Vec<u8>> = records
        .iter()
        .map(|r| encode_multipolygon(&r.geometry))
        .collect();
    let zones: Vec<u8> = records.iter().map(|r| r.zone.zone).collect();
    let northern: Vec<bool> = records.iter().map(|r| r.zone.is_northern).collect();
    let orbits: Vec<u8> = records.iter().map(|r| r.orbit.number()).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(tile_ids)),
        Arc::new(BinaryArray::from_iter_values(geometries.iter())),
        Arc::new(UInt8Array::from(zones)),
        Arc::new(BooleanArray::from(northern)),
        Arc::new(UInt8Array::from(orbits)),
    ];

    Ok(RecordBatch::try_new(coverage_schema(), columns)?)
}

/// GeoParquet `geo` metadata for a set of records.
pub fn geo_metadata(records: &[CoverageRecord]) -> String {
    let mut column = json!({
        "encoding": "WKB",
        "geometry_types": ["MultiPolygon"],
    });
    if let Some(bbox) = combined_rect(records.iter().filter_map(|r| r.geometry.bounding_rect())) {
        column["bbox"] = json!([bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y]);
    }

    json!({
        "version": "1.0.0",
        "primary_column": GEOMETRY_COLUMN,
        "columns": { GEOMETRY_COLUMN: column },
    })
    .to_string()
}

/// Write records to a Parquet file, creating parent directories.
///
/// Returns the number of rows written.
pub fn write_parquet(path: &Path, records: &[CoverageRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_key_value_metadata(Some(vec![KeyValue::new(
            "geo".to_string(),
            geo_metadata(records),
        )]))
        .build();

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, coverage_schema(), Some(props))?;
    if !records.is_empty() {
        writer.write(&records_to_batch(records)?)?;
    }
    writer.close()?;

    info!(path = %path.display(), rows = records.len(), "Wrote coverage table");
    Ok(records.len())
}
