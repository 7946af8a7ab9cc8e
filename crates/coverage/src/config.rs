//! Configuration for coverage runs.

use std::collections::BTreeSet;
use std::path::Path;

use mgrs_common::ANTIMERIDIAN_ZONES;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoverageError, Result};

/// Sentinel-2 MSI swath half-width (290 km swath) in meters.
pub const DEFAULT_SWATH_HALF_WIDTH_M: f64 = 145_000.0;

/// Catalog records processed per chunk when building an existence filter.
pub const DEFAULT_CATALOG_CHUNK_SIZE: usize = 100_000;

/// Configuration for a coverage run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Half-width of the swath around a ground track, in meters.
    pub swath_half_width_m: f64,

    /// UTM zone numbers excluded from processing.
    pub skip_zones: Vec<u8>,

    /// Worker threads for zone processing (None = rayon default).
    pub workers: Option<usize>,

    /// Catalog records per existence-filter chunk.
    pub catalog_chunk_size: usize,

    /// KML folder holding the tiling grid.
    pub grid_layer: String,

    /// KML folder holding acquisition segments.
    pub acquisition_layer: String,

    /// Placemark attribute carrying the relative orbit of a ground track.
    pub orbit_field: String,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            swath_half_width_m: DEFAULT_SWATH_HALF_WIDTH_M,
            skip_zones: ANTIMERIDIAN_ZONES.to_vec(),
            workers: None,
            catalog_chunk_size: DEFAULT_CATALOG_CHUNK_SIZE,
            grid_layer: "Features".to_string(),
            acquisition_layer: "NOMINAL".to_string(),
            orbit_field: "OrbitRelative".to_string(),
        }
    }
}

impl CoverageConfig {
    /// Parse configuration from YAML. Missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CoverageError::config(format!("invalid configuration: {}", e)))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoverageError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `S2_ORBITS_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("S2_ORBITS_WORKERS") {
            match val.trim().parse::<usize>() {
                Ok(workers) => self.workers = Some(workers),
                Err(_) => warn!(value = %val, "Ignoring invalid S2_ORBITS_WORKERS"),
            }
        }

        if let Some(val) = lookup("S2_ORBITS_CHUNK_SIZE") {
            match val.trim().parse::<usize>() {
                Ok(size) => self.catalog_chunk_size = size,
                Err(_) => warn!(value = %val, "Ignoring invalid S2_ORBITS_CHUNK_SIZE"),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.swath_half_width_m.is_finite() || self.swath_half_width_m <= 0.0 {
            return Err(CoverageError::config(
                "swath_half_width_m must be a positive number of meters",
            ));
        }

        if let Some(zone) = self.skip_zones.iter().find(|z| !(1..=60).contains(*z)) {
            return Err(CoverageError::config(format!(
                "skip_zones contains invalid zone {}",
                zone
            )));
        }

        if self.workers == Some(0) {
            return Err(CoverageError::config("workers must be > 0"));
        }

        if self.catalog_chunk_size == 0 {
            return Err(CoverageError::config("catalog_chunk_size must be > 0"));
        }

        if self.grid_layer.trim().is_empty() || self.acquisition_layer.trim().is_empty() {
            return Err(CoverageError::config("layer names must not be empty"));
        }

        if self.orbit_field.trim().is_empty() {
            return Err(CoverageError::config("orbit_field must not be empty"));
        }

        Ok(())
    }

    /// Skip set as a lookup structure.
    pub fn skip_zone_set(&self) -> BTreeSet<u8> {
        self.skip_zones.iter().copied().collect()
    }
}
