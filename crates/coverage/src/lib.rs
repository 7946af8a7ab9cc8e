//! Relative orbit x MGRS tile coverage.
//!
//! Determines which tiles of the Sentinel-2 tiling grid each relative orbit
//! actually covers, and the exact covered part of every tile.
//!
//! # Pipeline
//!
//! 1. [`sources`] loads the grid, ground tracks or acquisition plans.
//! 2. [`partition`] groups tiles by UTM zone and hemisphere, setting the
//!    antimeridian zones aside.
//! 3. [`engine`] fans the zones out over a rayon pool; [`zone`] does the
//!    per-zone work: bbox pre-filter, clip, projection into UTM, swath
//!    buffering ([`swath`]), R-tree join and per-(tile, orbit) dissolve.
//! 4. An optional [`existence`] filter keeps only pairs that really have
//!    products in the catalog.
//! 5. [`output`] writes the records as GeoParquet.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use coverage::{load_grid, load_ground_tracks, write_parquet, CoverageConfig, CoverageEngine};
//!
//! let config = CoverageConfig::default();
//! let tiles = load_grid(Path::new("grid.kml"), &config.grid_layer)?;
//! let tracks = load_ground_tracks(Path::new("tracks.kml"), None, &config.orbit_field)?;
//!
//! let run = CoverageEngine::new(config)?.run(&tiles, &tracks)?;
//! write_parquet(Path::new("orbits.parquet"), &run.records)?;
//! # Ok::<(), coverage::CoverageError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod existence;
pub mod footprint;
pub mod ops;
pub mod output;
pub mod partition;
pub mod reproject;
pub mod sources;
pub mod swath;
pub mod types;
pub mod wkb;
pub mod zone;

pub use config::{CoverageConfig, DEFAULT_CATALOG_CHUNK_SIZE, DEFAULT_SWATH_HALF_WIDTH_M};
pub use engine::{CoverageEngine, ProgressCallback, ZoneProgress};
pub use error::{CoverageError, Result};
pub use existence::{CatalogStats, ExistenceFilter, ExistenceFilterBuilder};
pub use footprint::Footprint;
pub use output::{coverage_schema, write_parquet};
pub use partition::{partition_by_zone, ZonePartition};
pub use sources::{load_acquisition_file, load_acquisitions, load_grid, load_ground_tracks};
pub use swath::{build_swaths, Swath};
pub use types::{
    AcquisitionSegment, CoverageRecord, CoverageRun, GroundTrack, SkipReason, SkippedZone, Tile,
    ZoneOutcome,
};
pub use zone::process_zone;
