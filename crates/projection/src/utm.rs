//! Universal Transverse Mercator zones.
//!
//! Each of the 60 zones is a Transverse Mercator projection centred on the
//! zone's central meridian, with scale factor 0.9996, a false easting of
//! 500 km and, in the southern hemisphere, a false northing of 10 000 km.

use crate::transverse_mercator::{Ellipsoid, TransverseMercator};
use crate::ProjectionError;

/// Scale factor on the central meridian.
pub const UTM_SCALE_FACTOR: f64 = 0.9996;
/// False easting applied to every zone (meters).
pub const UTM_FALSE_EASTING: f64 = 500_000.0;
/// False northing applied to southern-hemisphere zones (meters).
pub const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A WGS84 / UTM zone projection.
#[derive(Debug, Clone)]
pub struct UtmProjection {
    zone: u8,
    is_northern: bool,
    tm: TransverseMercator,
}

impl UtmProjection {
    /// Create the projection for a zone.
    ///
    /// # Arguments
    /// * `zone` - Zone number (1-60)
    /// * `is_northern` - True for the northern hemisphere variant
    pub fn new(zone: u8, is_northern: bool) -> Result<Self, ProjectionError> {
        if !(1..=60).contains(&zone) {
            return Err(ProjectionError::InvalidZone(zone));
        }

        let lon0 = (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0;
        let false_northing = if is_northern {
            0.0
        } else {
            UTM_FALSE_NORTHING_SOUTH
        };

        Ok(Self {
            zone,
            is_northern,
            tm: TransverseMercator::new(
                lon0,
                UTM_SCALE_FACTOR,
                UTM_FALSE_EASTING,
                false_northing,
                Ellipsoid::WGS84,
            ),
        })
    }

    /// Create the projection from an EPSG code (32601-32660, 32701-32760).
    pub fn from_epsg(code: u32) -> Result<Self, ProjectionError> {
        match code {
            32601..=32660 => Self::new((code - 32600) as u8, true),
            32701..=32760 => Self::new((code - 32700) as u8, false),
            _ => Err(ProjectionError::UnsupportedEpsg(code)),
        }
    }

    pub fn zone(&self) -> u8 {
        self.zone
    }

    pub fn is_northern(&self) -> bool {
        self.is_northern
    }

    /// EPSG code of this zone.
    pub fn epsg(&self) -> u32 {
        if self.is_northern {
            32600 + self.zone as u32
        } else {
            32700 + self.zone as u32
        }
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        self.tm.lon0
    }

    /// Geographic (lon, lat) degrees to (easting, northing) meters.
    pub fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        self.tm.forward(lon, lat)
    }

    /// (easting, northing) meters to geographic (lon, lat) degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> Option<(f64, f64)> {
        self.tm.inverse(easting, northing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_parameters() {
        let utm = UtmProjection::new(33, true).unwrap();
        assert_eq!(utm.central_meridian(), 15.0);
        assert_eq!(utm.epsg(), 32633);

        let south = UtmProjection::from_epsg(32723).unwrap();
        assert_eq!(south.zone(), 23);
        assert!(!south.is_northern());
        assert_eq!(south.central_meridian(), -45.0);
    }

    #[test]
    fn test_invalid_zone() {
        assert!(matches!(
            UtmProjection::new(0, true),
            Err(ProjectionError::InvalidZone(0))
        ));
        assert!(matches!(
            UtmProjection::from_epsg(4326),
            Err(ProjectionError::UnsupportedEpsg(4326))
        ));
    }

    #[test]
    fn test_southern_false_northing() {
        let utm = UtmProjection::new(34, false).unwrap();
        let (e, n) = utm.forward(18.9, -33.2).unwrap();
        // West of the 21E central meridian, south of the equator
        assert!(e > 100_000.0 && e < 900_000.0);
        assert!(n > 6_000_000.0 && n < 10_000_000.0);
    }
}
