//! Features that can be joined against tiles: ground tracks and acquisition segments.

use geo::{BoundingRect, MultiPolygon, Rect};
use mgrs_common::RelativeOrbit;
use projection::UtmProjection;
use tracing::warn;

use crate::ops::clip_polygons;
use crate::reproject::polygons_to_utm;
use crate::swath::swath_for_track;
use crate::types::{AcquisitionSegment, GroundTrack};

/// A lon/lat feature that covers ground for one relative orbit.
pub trait Footprint: Sync {
    /// Relative orbit the feature belongs to.
    fn orbit(&self) -> RelativeOrbit;

    /// Identifier used in diagnostics.
    fn label(&self) -> String;

    /// Bounding rectangle in lon/lat, `None` for empty features.
    fn envelope(&self) -> Option<Rect<f64>>;

    /// Covered area inside `bbox`, in the zone's UTM meters.
    ///
    /// `None` when nothing usable remains for this zone.
    fn localize(
        &self,
        bbox: &Rect<f64>,
        utm: &UtmProjection,
        half_width: f64,
    ) -> Option<MultiPolygon<f64>>;
}

impl Footprint for GroundTrack {
    fn orbit(&self) -> RelativeOrbit {
        self.orbit
    }

    fn label(&self) -> String {
        format!("ground track {}", self.orbit)
    }

    fn envelope(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    fn localize(
        &self,
        bbox: &Rect<f64>,
        utm: &UtmProjection,
        half_width: f64,
    ) -> Option<MultiPolygon<f64>> {
        swath_for_track(self, bbox, utm, half_width)
    }
}

impl Footprint for AcquisitionSegment {
    fn orbit(&self) -> RelativeOrbit {
        self.orbit
    }

    fn label(&self) -> String {
        format!("acquisition segment {}", self.id)
    }

    fn envelope(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Acquisition footprints are already areal; `half_width` is unused.
    fn localize(
        &self,
        bbox: &Rect<f64>,
        utm: &UtmProjection,
        _half_width: f64,
    ) -> Option<MultiPolygon<f64>> {
        let clipped = clip_polygons(&self.geometry, bbox);
        if clipped.0.is_empty() {
            return None;
        }

        match polygons_to_utm(&clipped, utm) {
            Ok(projected) => Some(projected),
            Err(e) => {
                warn!(segment = %self.id, epsg = utm.epsg(), error = %e, "Dropping acquisition segment");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Coord, LineString, Polygon};
    use test_utils::square_ring;

    fn segment(ring: Vec<(f64, f64)>) -> AcquisitionSegment {
        AcquisitionSegment {
            id: "12".to_string(),
            orbit: RelativeOrbit(84),
            geometry: MultiPolygon::new(vec![Polygon::new(LineString::from(ring), Vec::new())]),
            observation_start: None,
            observation_stop: None,
        }
    }

    #[test]
    fn test_acquisition_localize_clips() {
        let utm = UtmProjection::new(33, true).unwrap();
        let seg = segment(square_ring(14.0, 50.0, 4.0));
        let bbox = Rect::new(Coord { x: 12.0, y: 51.0 }, Coord { x: 15.0, y: 52.0 });

        let local = seg.localize(&bbox, &utm, 145_000.0).unwrap();
        let full = polygons_to_utm(&seg.geometry, &utm).unwrap();
        assert!(local.unsigned_area() > 0.0);
        assert!(local.unsigned_area() < full.unsigned_area() / 4.0);
        assert_eq!(seg.label(), "acquisition segment 12");
    }

    #[test]
    fn test_acquisition_outside_bbox() {
        let utm = UtmProjection::new(33, true).unwrap();
        let seg = segment(square_ring(30.0, 10.0, 1.0));
        let bbox = Rect::new(Coord { x: 12.0, y: 51.0 }, Coord { x: 15.0, y: 52.0 });
        assert!(seg.localize(&bbox, &utm, 145_000.0).is_none());
    }
}
