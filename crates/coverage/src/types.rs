//! Core data types: tiles, ground tracks, acquisition segments and results.

use std::fmt;

use geo::{MultiLineString, MultiPolygon};
use mgrs_common::{RelativeOrbit, TileId, ZoneKey};

/// One MGRS tile of the tiling grid, in WGS84 lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub id: TileId,
    /// Always 2-D and polygonal
    pub geometry: MultiPolygon<f64>,
}

impl Tile {
    pub fn zone_key(&self) -> ZoneKey {
        self.id.zone_key()
    }
}

/// Reference ground track of one relative orbit, in WGS84 lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTrack {
    pub orbit: RelativeOrbit,
    pub geometry: MultiLineString<f64>,
}

/// A planned acquisition segment from an acquisition plan.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionSegment {
    pub id: String,
    pub orbit: RelativeOrbit,
    /// Repaired footprint in WGS84 lon/lat
    pub geometry: MultiPolygon<f64>,
    pub observation_start: Option<String>,
    pub observation_stop: Option<String>,
}

/// Coverage of one tile by one relative orbit.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRecord {
    pub tile_id: TileId,
    pub orbit: RelativeOrbit,
    pub zone: ZoneKey,
    /// Intersection in WGS84 lon/lat; may be empty when geometries only touch
    pub geometry: MultiPolygon<f64>,
}

/// Why a zone produced no records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Zone straddles the antimeridian and is excluded by configuration.
    Antimeridian,
    /// A geometry fault aborted the zone.
    GeometryFault(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Antimeridian => write!(f, "antimeridian zone"),
            Self::GeometryFault(msg) => write!(f, "geometry fault: {}", msg),
        }
    }
}

/// A zone left out of the result.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedZone {
    pub key: ZoneKey,
    pub reason: SkipReason,
    /// Tiles of the zone, in grid order
    pub tiles: Vec<TileId>,
}

/// Result of processing a single zone.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneOutcome {
    Completed {
        key: ZoneKey,
        records: Vec<CoverageRecord>,
    },
    Skipped(SkippedZone),
}

impl ZoneOutcome {
    pub fn key(&self) -> ZoneKey {
        match self {
            Self::Completed { key, .. } => *key,
            Self::Skipped(skipped) => skipped.key,
        }
    }
}

/// Result of a full run: records of every completed zone plus the skipped ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageRun {
    /// Records ordered by zone key, then grid order, then orbit
    pub records: Vec<CoverageRecord>,
    /// Skipped zones ordered by zone key
    pub skipped: Vec<SkippedZone>,
}

impl CoverageRun {
    /// Whether every zone was processed.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Zones skipped because of a geometry fault.
    pub fn faulted(&self) -> impl Iterator<Item = &SkippedZone> {
        self.skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::GeometryFault(_)))
    }

    /// Append another run, keeping zone-key order of the skipped list.
    pub fn extend(&mut self, other: CoverageRun) {
        self.records.extend(other.records);
        self.skipped.extend(other.skipped);
        self.skipped.sort_by_key(|s| s.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skipped(zone: u8, reason: SkipReason) -> SkippedZone {
        SkippedZone {
            key: ZoneKey::new(zone, true).unwrap(),
            reason,
            tiles: Vec::new(),
        }
    }

    #[test]
    fn test_faulted_filters_antimeridian() {
        let run = CoverageRun {
            records: Vec::new(),
            skipped: vec![
                skipped(1, SkipReason::Antimeridian),
                skipped(33, SkipReason::GeometryFault("NaN".into())),
            ],
        };
        assert!(!run.is_complete());
        let faulted: Vec<_> = run.faulted().collect();
        assert_eq!(faulted.len(), 1);
        assert_eq!(faulted[0].key.zone, 33);
    }

    #[test]
    fn test_extend_keeps_zone_order() {
        let mut run = CoverageRun {
            records: Vec::new(),
            skipped: vec![skipped(60, SkipReason::Antimeridian)],
        };
        run.extend(CoverageRun {
            records: Vec::new(),
            skipped: vec![skipped(1, SkipReason::Antimeridian)],
        });
        let zones: Vec<u8> = run.skipped.iter().map(|s| s.key.zone).collect();
        assert_eq!(zones, vec![1, 60]);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Antimeridian.to_string(), "antimeridian zone");
        assert_eq!(
            SkipReason::GeometryFault("bad".into()).to_string(),
            "geometry fault: bad"
        );
    }
}
