//! Swath polygons: ground tracks buffered in a zone's UTM plane.
//!
//! The buffer itself comes from the `geo` boolean engine. Caps are flat
//! (butt), so a swath ends exactly at the ends of its clipped ground track;
//! joins at interior vertices are round.

use geo::algorithm::buffer::{Buffer, BufferStyle, LineCap};
use geo::{Coord, LineString, MultiLineString, MultiPolygon, Rect};
use mgrs_common::RelativeOrbit;
use projection::UtmProjection;
use tracing::{debug, warn};

use crate::ops::clip_lines;
use crate::reproject::lines_to_utm;
use crate::types::GroundTrack;

/// A ground track buffered into its swath, in UTM meters.
#[derive(Debug, Clone, PartialEq)]
pub struct Swath {
    pub orbit: RelativeOrbit,
    pub geometry: MultiPolygon<f64>,
}

/// Flat caps, default round joins.
fn swath_style(half_width: f64) -> BufferStyle<f64> {
    BufferStyle::new(half_width).line_cap(LineCap::Butt)
}

/// Drop repeated vertices; `None` for lines with a non-finite vertex or no
/// segment of positive length.
fn bufferable(line: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(line.0.len());
    for c in &line.0 {
        if !c.x.is_finite() || !c.y.is_finite() {
            return None;
        }
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if coords.len() < 2 {
        return None;
    }
    Some(LineString::new(coords))
}

/// Buffer one projected line.
///
/// Returns `None` when the line has no segment of positive finite length.
pub fn buffer_line(line: &LineString<f64>, half_width: f64) -> Option<MultiPolygon<f64>> {
    let line = bufferable(line)?;
    Some(line.buffer_with_style(swath_style(half_width)))
}

/// Buffer every line of a projected multi-line; overlapping parts are merged.
pub fn buffer_lines(lines: &MultiLineString<f64>, half_width: f64) -> Option<MultiPolygon<f64>> {
    let lines: Vec<LineString<f64>> = lines.0.iter().filter_map(bufferable).collect();
    if lines.is_empty() {
        return None;
    }
    Some(MultiLineString::new(lines).buffer_with_style(swath_style(half_width)))
}

/// Swath of one ground track inside a zone.
///
/// The track is clipped to the zone bbox in lon/lat, projected, then
/// buffered. Tracks missing the bbox yield `None` quietly; tracks that
/// cannot be projected or have no length are dropped with a warning.
pub fn swath_for_track(
    track: &GroundTrack,
    bbox: &Rect<f64>,
    utm: &UtmProjection,
    half_width: f64,
) -> Option<MultiPolygon<f64>> {
    let clipped = clip_lines(&track.geometry, bbox);
    if clipped.0.iter().all(|l| l.0.len() < 2) {
        debug!(orbit = %track.orbit, "Ground track misses zone bbox");
        return None;
    }

    let projected = match lines_to_utm(&clipped, utm) {
        Ok(projected) => projected,
        Err(e) => {
            warn!(orbit = %track.orbit, epsg = utm.epsg(), error = %e, "Dropping ground track");
            return None;
        }
    };

    let swath = buffer_lines(&projected, half_width);
    if swath.is_none() {
        warn!(orbit = %track.orbit, epsg = utm.epsg(), "Dropping zero-length ground track");
    }
    swath
}

/// Build the swaths of every track for one zone.
pub fn build_swaths(
    tracks: &[&GroundTrack],
    bbox: &Rect<f64>,
    utm: &UtmProjection,
    half_width: f64,
) -> Vec<Swath> {
    tracks
        .iter()
        .filter_map(|track| {
            swath_for_track(track, bbox, utm, half_width).map(|geometry| Swath {
                orbit: track.orbit,
                geometry,
            })
        })
        .collect()
}
