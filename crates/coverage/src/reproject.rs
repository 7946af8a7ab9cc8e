//! Moving geometries between WGS84 lon/lat and a zone's UTM plane.

use geo::{Coord, MapCoords, MultiLineString, MultiPolygon};
use projection::UtmProjection;

use crate::error::{CoverageError, Result};

fn forward(utm: &UtmProjection, c: Coord<f64>) -> Result<Coord<f64>> {
    utm.forward(c.x, c.y)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| Coord { x, y })
        .ok_or_else(|| {
            CoverageError::geometry(format!(
                "({}, {}) cannot be projected into EPSG:{}",
                c.x,
                c.y,
                utm.epsg()
            ))
        })
}

fn inverse(utm: &UtmProjection, c: Coord<f64>) -> Result<Coord<f64>> {
    utm.inverse(c.x, c.y)
        .filter(|(lon, lat)| lon.is_finite() && lat.is_finite())
        .map(|(x, y)| Coord { x, y })
        .ok_or_else(|| {
            CoverageError::geometry(format!(
                "({}, {}) in EPSG:{} has no geographic position",
                c.x,
                c.y,
                utm.epsg()
            ))
        })
}

/// Project polygons from lon/lat into UTM meters.
pub fn polygons_to_utm(geometry: &MultiPolygon<f64>, utm: &UtmProjection) -> Result<MultiPolygon<f64>> {
    geometry.try_map_coords(|c| forward(utm, c))
}

/// Project polygons from UTM meters back to lon/lat.
pub fn polygons_to_lonlat(geometry: &MultiPolygon<f64>, utm: &UtmProjection) -> Result<MultiPolygon<f64>> {
    geometry.try_map_coords(|c| inverse(utm, c))
}

/// Project lines from lon/lat into UTM meters.
pub fn lines_to_utm(lines: &MultiLineString<f64>, utm: &UtmProjection) -> Result<MultiLineString<f64>> {
    lines.try_map_coords(|c| forward(utm, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use test_utils::{assert_approx_eq, square_ring};

    fn square(lon: f64, lat: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(square_ring(lon, lat, 1.0)),
            Vec::new(),
        )])
    }

    #[test]
    fn test_polygon_roundtrip() {
        let utm = UtmProjection::new(33, true).unwrap();
        let tile = square(14.5, 52.0);
        let projected = polygons_to_utm(&tile, &utm).unwrap();
        let back = polygons_to_lonlat(&projected, &utm).unwrap();

        for (a, b) in tile.0[0].exterior().0.iter().zip(back.0[0].exterior().0.iter()) {
            assert_approx_eq!(a.x, b.x, 1e-6);
            assert_approx_eq!(a.y, b.y, 1e-6);
        }
    }

    #[test]
    fn test_non_finite_is_geometry_fault() {
        let utm = UtmProjection::new(33, true).unwrap();
        let bad = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(15.0, 50.0), (f64::NAN, 50.0), (15.0, 51.0), (15.0, 50.0)]),
            Vec::new(),
        )]);
        let err = polygons_to_utm(&bad, &utm).unwrap_err();
        assert!(err.is_geometry_fault());
    }

    #[test]
    fn test_out_of_domain_is_geometry_fault() {
        // 170 degrees away from the 15E central meridian
        let utm = UtmProjection::new(33, true).unwrap();
        let lines = MultiLineString::new(vec![LineString::from(vec![(-175.0, 10.0), (-174.0, 10.0)])]);
        assert!(lines_to_utm(&lines, &utm).unwrap_err().is_geometry_fault());
    }
}
