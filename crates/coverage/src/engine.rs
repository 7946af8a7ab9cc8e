//! Zone fan-out: runs the per-zone join on a rayon pool.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use mgrs_common::ZoneKey;
use rayon::prelude::*;
use tracing::{error, info};

use crate::config::CoverageConfig;
use crate::error::{CoverageError, Result};
use crate::existence::ExistenceFilter;
use crate::footprint::Footprint;
use crate::partition::{partition_by_zone, ZonePartition};
use crate::types::{CoverageRun, SkipReason, SkippedZone, Tile, ZoneOutcome};
use crate::zone::process_zone;

/// Progress snapshot passed to the callback after every finished zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneProgress {
    pub key: ZoneKey,
    pub completed: usize,
    pub total: usize,
}

/// Callback invoked from worker threads after every finished zone.
pub type ProgressCallback = Arc<dyn Fn(ZoneProgress) + Send + Sync>;

/// Runs coverage joins over every zone of a tiling grid.
pub struct CoverageEngine {
    config: CoverageConfig,
    filter: Option<ExistenceFilter>,
    progress: Option<ProgressCallback>,
    cancel: Arc<AtomicBool>,
}

impl CoverageEngine {
    /// Create an engine; the configuration is validated first.
    pub fn new(config: CoverageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            filter: None,
            progress: None,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Keep only (tile, orbit) pairs present in `filter`.
    pub fn with_filter(mut self, filter: ExistenceFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that cancels the run when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    /// Intersect `tiles` with `footprints`, zone by zone.
    ///
    /// Zones hit by a geometry fault are reported in `CoverageRun::skipped`;
    /// any other error aborts the run.
    pub fn run<F: Footprint>(&self, tiles: &[Tile], footprints: &[F]) -> Result<CoverageRun> {
        let partition = partition_by_zone(tiles, &self.config.skip_zone_set());

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(workers) = self.config.workers {
            builder = builder.num_threads(workers);
        }
        let pool = builder
            .build()
            .map_err(|e| CoverageError::config(format!("cannot build worker pool: {}", e)))?;

        info!(
            zones = partition.groups.len(),
            footprints = footprints.len(),
            workers = pool.current_num_threads(),
            "Starting coverage run"
        );

        let outcomes = pool.install(|| self.run_zones(&partition, footprints))?;
        Ok(self.collect(partition.skipped, outcomes))
    }

    fn run_zones<F: Footprint>(
        &self,
        partition: &ZonePartition<'_>,
        footprints: &[F],
    ) -> Result<Vec<ZoneOutcome>> {
        let keys = partition.keys();
        let total = keys.len();
        let completed = AtomicUsize::new(0);

        let results: Vec<Result<ZoneOutcome>> = keys
            .par_iter()
            .map(|key| {
                if self.cancel.load(Ordering::Relaxed) {
                    return Err(CoverageError::Cancelled);
                }

                let tiles = partition.groups.get(key).map(Vec::as_slice).unwrap_or(&[]);
                let outcome = match process_zone(
                    *key,
                    tiles,
                    footprints,
                    self.filter.as_ref(),
                    self.config.swath_half_width_m,
                ) {
                    Ok(records) => ZoneOutcome::Completed { key: *key, records },
                    Err(CoverageError::Geometry(msg)) => {
                        error!(zone = %key, error = %msg, "Skipping zone after geometry fault");
                        ZoneOutcome::Skipped(SkippedZone {
                            key: *key,
                            reason: SkipReason::GeometryFault(msg),
                            tiles: tiles.iter().map(|t| t.id.clone()).collect(),
                        })
                    }
                    Err(e) => return Err(e),
                };

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = &self.progress {
                    cb(ZoneProgress {
                        key: *key,
                        completed: done,
                        total,
                    });
                }
                Ok(outcome)
            })
            .collect();

        results.into_iter().collect()
    }

    fn collect(&self, mut skipped: Vec<SkippedZone>, outcomes: Vec<ZoneOutcome>) -> CoverageRun {
        let mut records = Vec::new();
        for outcome in outcomes {
            match outcome {
                ZoneOutcome::Completed { records: zone_records, .. } => records.extend(zone_records),
                ZoneOutcome::Skipped(zone) => skipped.push(zone),
            }
        }
        skipped.sort_by_key(|s| s.key);

        info!(
            records = records.len(),
            skipped = skipped.len(),
            "Coverage run finished"
        );
        CoverageRun { records, skipped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiLineString, MultiPolygon, Polygon};
    use mgrs_common::{RelativeOrbit, TileId};
    use std::sync::Mutex;
    use test_utils::{meridian_track, square_ring};

    use crate::types::GroundTrack;

    fn tile(code: &str, lon: f64, lat: f64) -> Tile {
        Tile {
            id: TileId::parse(code).unwrap(),
            geometry: MultiPolygon::new(vec![Polygon::new(
                LineString::from(square_ring(lon, lat, 1.0)),
                Vec::new(),
            )]),
        }
    }

    fn track(orbit: u8, lon: f64) -> GroundTrack {
        GroundTrack {
            orbit: RelativeOrbit(orbit),
            geometry: MultiLineString::new(vec![LineString::from(meridian_track(lon, -80.0, 80.0, 160))]),
        }
    }

    #[test]
    fn test_records_in_zone_order() {
        let tiles = vec![
            tile("33UUU", 14.5, 52.0),
            tile("32UNU", 8.5, 52.0),
            tile("01UCU", -177.5, 52.0),
        ];
        let tracks = vec![track(1, 14.6), track(2, 8.6), track(3, -177.5)];

        let engine = CoverageEngine::new(CoverageConfig {
            workers: Some(2),
            ..CoverageConfig::default()
        })
        .unwrap();
        let run = engine.run(&tiles, &tracks).unwrap();

        let zones: Vec<u8> = run.records.iter().map(|r| r.zone.zone).collect();
        assert_eq!(zones, vec![32, 33]);
        assert_eq!(run.skipped.len(), 1);
        assert_eq!(run.skipped[0].key.zone, 1);
        assert_eq!(run.skipped[0].reason, SkipReason::Antimeridian);
    }

    #[test]
    fn test_geometry_fault_skips_only_that_zone() {
        let bad = Tile {
            id: TileId::parse("34UDU").unwrap(),
            geometry: MultiPolygon::new(vec![Polygon::new(
                LineString::from(vec![(20.0, 52.0), (f64::INFINITY, 52.0), (21.0, 53.0), (20.0, 52.0)]),
                Vec::new(),
            )]),
        };
        let tiles = vec![tile("33UUU", 14.5, 52.0), bad];
        let tracks = vec![track(22, 14.6), track(23, 20.5)];

        let run = CoverageEngine::new(CoverageConfig::default())
            .unwrap()
            .run(&tiles, &tracks)
            .unwrap();

        assert_eq!(run.records.len(), 1);
        assert_eq!(run.records[0].tile_id.as_str(), "33UUU");
        let faulted: Vec<_> = run.faulted().collect();
        assert_eq!(faulted.len(), 1);
        assert_eq!(faulted[0].key.zone, 34);
        assert_eq!(faulted[0].tiles.len(), 1);
    }

    #[test]
    fn test_progress_and_cancel() {
        let tiles = vec![tile("33UUU", 14.5, 52.0), tile("32UNU", 8.5, 52.0)];
        let tracks = vec![track(22, 14.6)];

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let engine = CoverageEngine::new(CoverageConfig::default())
            .unwrap()
            .with_progress(Arc::new(move |p: ZoneProgress| {
                sink.lock().unwrap().push((p.completed, p.total));
            }));
        engine.run(&tiles, &tracks).unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![(1, 2), (2, 2)]);

        engine.cancel_handle().store(true, Ordering::Relaxed);
        assert!(matches!(
            engine.run(&tiles, &tracks),
            Err(CoverageError::Cancelled)
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CoverageConfig {
            swath_half_width_m: 0.0,
            ..CoverageConfig::default()
        };
        assert!(CoverageEngine::new(config).is_err());
    }
}
