//! Existence filter: which relative orbits actually produced products for a tile.
//!
//! Built by streaming the public Sentinel-2 catalog index, which lists one
//! product per row. The relative orbit is taken from the product id
//! (`..._R022_T33UUU_...`).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flate2::read::MultiGzDecoder;
use mgrs_common::{RelativeOrbit, TileId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoverageError, Result};

/// Pattern locating the relative orbit inside a product id.
pub const ORBIT_PATTERN: &str = r"_R(\d{3})_";

/// Tile id -> set of relative orbits with at least one product.
///
/// Serialized as `{"33UUU": [22, 65]}` with sorted keys and arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExistenceFilter {
    tiles: BTreeMap<TileId, BTreeSet<RelativeOrbit>>,
}

impl ExistenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `tile` was observed on `orbit`.
    pub fn insert(&mut self, tile: TileId, orbit: RelativeOrbit) -> bool {
        self.tiles.entry(tile).or_default().insert(orbit)
    }

    /// Whether the pair is allowed.
    pub fn contains(&self, tile: &TileId, orbit: RelativeOrbit) -> bool {
        self.tiles
            .get(tile)
            .map(|orbits| orbits.contains(&orbit))
            .unwrap_or(false)
    }

    /// Orbits recorded for a tile.
    pub fn orbits(&self, tile: &TileId) -> Option<&BTreeSet<RelativeOrbit>> {
        self.tiles.get(tile)
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of (tile, orbit) pairs.
    pub fn pair_count(&self) -> usize {
        self.tiles.values().map(BTreeSet::len).sum()
    }

    /// Merge another filter into this one.
    pub fn merge(&mut self, other: ExistenceFilter) {
        for (tile, orbits) in other.tiles {
            self.tiles.entry(tile).or_default().extend(orbits);
        }
    }

    /// Parse a filter from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoverageError::config(format!("malformed existence filter: {}", e)))
    }

    /// Load a filter file. Unreadable or malformed files are configuration errors.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoverageError::config(format!("cannot read filter {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CoverageError::config(format!(
                "malformed existence filter {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Serialize to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Counters for one catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub rows: usize,
    pub chunks: usize,
    /// Rows without an orbit in the product id or without a usable tile
    pub skipped_rows: usize,
}

/// Callback invoked after every processed chunk with the total rows read so far.
pub type ChunkProgress = Arc<dyn Fn(usize) + Send + Sync>;

/// Streams catalog CSVs into an [`ExistenceFilter`].
///
/// Rows are processed in chunks of `chunk_size` records; each chunk is
/// deduplicated before being merged, so the result does not depend on the
/// chunk size.
pub struct ExistenceFilterBuilder {
    chunk_size: usize,
    product_column: String,
    tile_column: String,
    pattern: Regex,
    filter: ExistenceFilter,
    /// Rows read across every added catalog
    rows_total: usize,
    progress: Option<ChunkProgress>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ExistenceFilterBuilder {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CoverageError::config("catalog chunk size must be > 0"));
        }
        let pattern = Regex::new(ORBIT_PATTERN)
            .map_err(|e| CoverageError::config(format!("invalid orbit pattern: {}", e)))?;

        Ok(Self {
            chunk_size,
            product_column: "product_id".to_string(),
            tile_column: "mgrs_tile".to_string(),
            pattern,
            filter: ExistenceFilter::new(),
            rows_total: 0,
            progress: None,
            cancel: None,
        })
    }

    /// Override the (case-insensitive) column names.
    pub fn with_columns(mut self, product: impl Into<String>, tile: impl Into<String>) -> Self {
        self.product_column = product.into();
        self.tile_column = tile.into();
        self
    }

    pub fn with_progress(mut self, progress: ChunkProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Add a catalog file; `.gz` files are decompressed on the fly.
    pub fn add_path(&mut self, path: &Path) -> Result<CatalogStats> {
        let file = File::open(path).map_err(|e| {
            CoverageError::config(format!("cannot open catalog {}: {}", path.display(), e))
        })?;

        let gzipped = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);

        let stats = if gzipped {
            self.add_reader(MultiGzDecoder::new(BufReader::new(file)), &path.display().to_string())?
        } else {
            self.add_reader(BufReader::new(file), &path.display().to_string())?
        };

        info!(
            path = %path.display(),
            rows = stats.rows,
            chunks = stats.chunks,
            skipped = stats.skipped_rows,
            "Read catalog"
        );
        Ok(stats)
    }

    /// Add a catalog from any reader. `origin` names the source in errors.
    pub fn add_reader<R: Read>(&mut self, reader: R, origin: &str) -> Result<CatalogStats> {
        let mut csv = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = csv.headers()?.clone();
        let product_idx = find_column(&headers, &self.product_column)
            .ok_or_else(|| missing_column(origin, &self.product_column, &headers))?;
        let tile_idx = find_column(&headers, &self.tile_column)
            .ok_or_else(|| missing_column(origin, &self.tile_column, &headers))?;

        let mut stats = CatalogStats::default();
        let mut chunk: HashSet<(TileId, RelativeOrbit)> = HashSet::new();
        let mut in_chunk = 0usize;

        for record in csv.records() {
            if in_chunk == 0 {
                self.check_cancelled()?;
            }
            let record = record?;
            stats.rows += 1;
            in_chunk += 1;

            let product = record.get(product_idx).unwrap_or("");
            let tile = record.get(tile_idx).unwrap_or("");
            match self.extract_pair(product, tile) {
                Some(pair) => {
                    chunk.insert(pair);
                }
                None => {
                    stats.skipped_rows += 1;
                    debug!(product = %product, tile = %tile, "Skipping catalog row");
                }
            }

            if in_chunk == self.chunk_size {
                self.flush_chunk(&mut chunk, in_chunk, &mut stats);
                in_chunk = 0;
            }
        }

        if in_chunk > 0 {
            self.flush_chunk(&mut chunk, in_chunk, &mut stats);
        }

        Ok(stats)
    }

    /// Finish building.
    pub fn build(self) -> ExistenceFilter {
        self.filter
    }

    fn extract_pair(&self, product: &str, tile: &str) -> Option<(TileId, RelativeOrbit)> {
        let tile = tile.trim();
        if tile.is_empty() {
            return None;
        }
        let orbit = self
            .pattern
            .captures(product)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u8>().ok())?;
        let tile = TileId::parse(tile).ok()?;
        Some((tile, RelativeOrbit(orbit)))
    }

    fn flush_chunk(
        &mut self,
        chunk: &mut HashSet<(TileId, RelativeOrbit)>,
        rows: usize,
        stats: &mut CatalogStats,
    ) {
        stats.chunks += 1;
        self.rows_total += rows;
        debug!(chunk = stats.chunks, rows, pairs = chunk.len(), "Merging catalog chunk");
        for (tile, orbit) in chunk.drain() {
            self.filter.insert(tile, orbit);
        }
        if let Some(progress) = &self.progress {
            progress(self.rows_total);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(CoverageError::Cancelled),
            _ => Ok(()),
        }
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn missing_column(origin: &str, name: &str, headers: &csv::StringRecord) -> CoverageError {
    CoverageError::source_format(
        origin,
        format!(
            "column '{}' not found (columns: {})",
            name,
            headers.iter().collect::<Vec<_>>().join(", ")
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use test_utils::{catalog_csv, product_id, temp_test_dir};

    fn tile(code: &str) -> TileId {
        TileId::parse(code).unwrap()
    }

    fn sample_rows() -> Vec<(String, String)> {
        let mut rows = Vec::new();
        for day in 1..=20 {
            rows.push((product_id("33UUU", 22, day), "33UUU".to_string()));
            rows.push((product_id("33UUU", 65, day), "33UUU".to_string()));
            rows.push((product_id("32TNS", 108, day), "32TNS".to_string()));
        }
        rows.push(("S2A_MSIL1C_NO_ORBIT_HERE".to_string(), "33UUU".to_string()));
        rows.push((product_id("33UVU", 22, 1), String::new()));
        rows
    }

    fn build(csv: &str, chunk_size: usize) -> (ExistenceFilter, CatalogStats) {
        let mut builder = ExistenceFilterBuilder::new(chunk_size).unwrap();
        let stats = builder.add_reader(csv.as_bytes(), "catalog.csv").unwrap();
        (builder.build(), stats)
    }

    #[test]
    fn test_orbits_per_tile() {
        let (filter, stats) = build(&catalog_csv(&sample_rows()), 100_000);
        assert_eq!(stats.rows, 62);
        assert_eq!(stats.skipped_rows, 2);
        assert_eq!(stats.chunks, 1);

        let orbits: Vec<u8> = filter.orbits(&tile("33UUU")).unwrap().iter().map(|o| o.0).collect();
        assert_eq!(orbits, vec![22, 65]);
        assert!(filter.contains(&tile("32TNS"), RelativeOrbit(108)));
        assert!(!filter.contains(&tile("33UUU"), RelativeOrbit(108)));
        assert!(filter.orbits(&tile("33UVU")).is_none());
        assert_eq!(filter.pair_count(), 3);
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        let csv = catalog_csv(&sample_rows());
        let (small, small_stats) = build(&csv, 10);
        let (large, _) = build(&csv, 100_000);
        assert_eq!(small, large);
        assert_eq!(small_stats.chunks, 7);
    }

    #[test]
    fn test_json_shape() {
        let (filter, _) = build(&catalog_csv(&sample_rows()), 100_000);
        let json = filter.to_json_string().unwrap();
        assert_eq!(json, r#"{"32TNS":[108],"33UUU":[22,65]}"#);
        assert_eq!(ExistenceFilter::from_json_str(&json).unwrap(), filter);
    }

    #[test]
    fn test_malformed_filter_is_config_error() {
        for bad in ["[1, 2]", r#"{"33UUU": ["x"]}"#, r#"{"XXXXX": [1]}"#, "{"] {
            assert!(matches!(
                ExistenceFilter::from_json_str(bad),
                Err(CoverageError::Config(_))
            ));
        }
    }

    #[test]
    fn test_case_insensitive_columns_and_missing_column() {
        let csv = "Product_Id,Mgrs_Tile\nS2B_MSIL1C_20200101T000000_N0208_R007_T01CCV_X,01CCV\n";
        let (filter, _) = build(csv, 5);
        assert!(filter.contains(&tile("01CCV"), RelativeOrbit(7)));

        let mut builder = ExistenceFilterBuilder::new(5).unwrap();
        let err = builder.add_reader("a,b\n1,2\n".as_bytes(), "x.csv").unwrap_err();
        assert!(matches!(err, CoverageError::SourceFormat { .. }));
    }

    #[test]
    fn test_gzip_catalog_and_merge() {
        let dir = temp_test_dir();
        let gz_path = dir.path().join("index.csv.gz");
        {
            let file = File::create(&gz_path).unwrap();
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder
                .write_all(catalog_csv(&[(product_id("33UUU", 22, 1), "33UUU".to_string())]).as_bytes())
                .unwrap();
            encoder.finish().unwrap();
        }
        let plain_path = dir.path().join("index2.csv");
        std::fs::write(
            &plain_path,
            catalog_csv(&[(product_id("33UUU", 65, 2), "33UUU".to_string())]),
        )
        .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut builder = ExistenceFilterBuilder::new(100)
            .unwrap()
            .with_progress(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        builder.add_path(&gz_path).unwrap();
        builder.add_path(&plain_path).unwrap();
        let filter = builder.build();

        assert_eq!(filter.orbits(&tile("33UUU")).unwrap().len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cancelled_build() {
        let cancel = Arc::new(AtomicBool::new(true));
        let mut builder = ExistenceFilterBuilder::new(10).unwrap().with_cancel_flag(cancel);
        let err = builder
            .add_reader(catalog_csv(&sample_rows()).as_bytes(), "catalog.csv")
            .unwrap_err();
        assert!(matches!(err, CoverageError::Cancelled));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ExistenceFilterBuilder::new(0),
            Err(CoverageError::Config(_))
        ));
    }

    #[test]
    fn test_merge() {
        let mut a = ExistenceFilter::new();
        a.insert(tile("33UUU"), RelativeOrbit(22));
        let mut b = ExistenceFilter::new();
        b.insert(tile("33UUU"), RelativeOrbit(65));
        b.insert(tile("32TNS"), RelativeOrbit(108));
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.pair_count(), 3);
    }
}
