//! Synthetic geometry generators.
//!
//! Coordinates are plain `(lon, lat)` tuples so this crate stays free of
//! geometry-library dependencies.

/// Closed rectangular ring, counter-clockwise, first point repeated at the end.
///
/// # Example
///
/// ```
/// use test_utils::rect_ring;
///
/// let ring = rect_ring(10.0, 45.0, 11.0, 46.0);
/// assert_eq!(ring.len(), 5);
/// assert_eq!(ring[0], ring[4]);
/// ```
pub fn rect_ring(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Vec<(f64, f64)> {
    vec![
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]
}

/// Closed square ring of `size` degrees with its lower-left corner at `(lon, lat)`.
pub fn square_ring(lon: f64, lat: f64, size: f64) -> Vec<(f64, f64)> {
    rect_ring(lon, lat, lon + size, lat + size)
}

/// Straight north-south ground track along a meridian.
///
/// # Arguments
///
/// * `lon` - Longitude of the track
/// * `lat_start` - First latitude
/// * `lat_end` - Last latitude
/// * `steps` - Number of segments (at least 1)
pub fn meridian_track(lon: f64, lat_start: f64, lat_end: f64, steps: usize) -> Vec<(f64, f64)> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            (lon, lat_start + (lat_end - lat_start) * t)
        })
        .collect()
}

/// Straight track between two points, sampled with `steps` segments.
pub fn straight_track(start: (f64, f64), end: (f64, f64), steps: usize) -> Vec<(f64, f64)> {
    let steps = steps.max(1);
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            (
                start.0 + (end.0 - start.0) * t,
                start.1 + (end.1 - start.1) * t,
            )
        })
        .collect()
}

/// Self-intersecting "bow-tie" ring spanning the given box.
pub fn bowtie_ring(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Vec<(f64, f64)> {
    vec![
        (min_lon, min_lat),
        (max_lon, max_lat),
        (max_lon, min_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_ring_closed() {
        let ring = square_ring(1.0, 2.0, 0.5);
        assert_eq!(ring.first(), ring.last());
        assert_eq!(ring[2], (1.5, 2.5));
    }

    #[test]
    fn test_meridian_track() {
        let track = meridian_track(15.0, -10.0, 10.0, 4);
        assert_eq!(track.len(), 5);
        assert_eq!(track[0], (15.0, -10.0));
        assert_eq!(track[2], (15.0, 0.0));
        assert_eq!(track[4], (15.0, 10.0));
    }

    #[test]
    fn test_straight_track() {
        let track = straight_track((0.0, 0.0), (2.0, 4.0), 2);
        assert_eq!(track, vec![(0.0, 0.0), (1.0, 2.0), (2.0, 4.0)]);
    }
}
