//! UTM zone keys and coordinate reference system codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CommonError;

/// EPSG code of WGS84 geographic coordinates (lon/lat degrees).
pub const WGS84_EPSG: u32 = 4326;

/// EPSG base code for WGS84 / UTM northern-hemisphere zones (32601..32660).
pub const UTM_NORTH_EPSG_BASE: u32 = 32600;

/// EPSG base code for WGS84 / UTM southern-hemisphere zones (32701..32760).
pub const UTM_SOUTH_EPSG_BASE: u32 = 32700;

/// Zones that straddle the antimeridian.
pub const ANTIMERIDIAN_ZONES: [u8; 2] = [1, 60];

/// A UTM projection zone: zone number plus hemisphere.
///
/// Ordering is by zone number, then southern before northern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneKey {
    /// Zone number (1-60)
    pub zone: u8,
    /// True for the northern hemisphere
    pub is_northern: bool,
}

impl ZoneKey {
    /// Create a zone key, validating the zone number.
    pub fn new(zone: u8, is_northern: bool) -> Result<Self, CommonError> {
        if !(1..=60).contains(&zone) {
            return Err(CommonError::InvalidZone(zone as u32));
        }
        Ok(Self { zone, is_northern })
    }

    /// EPSG code of the WGS84 / UTM system for this zone.
    pub fn epsg(&self) -> u32 {
        let base = if self.is_northern {
            UTM_NORTH_EPSG_BASE
        } else {
            UTM_SOUTH_EPSG_BASE
        };
        base + self.zone as u32
    }

    /// Longitude of the zone's central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        (self.zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// Whether this zone straddles the antimeridian.
    pub fn is_antimeridian(&self) -> bool {
        ANTIMERIDIAN_ZONES.contains(&self.zone)
    }
}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hemi = if self.is_northern { 'N' } else { 'S' };
        write!(f, "{:02}{}", self.zone, hemi)
    }
}
