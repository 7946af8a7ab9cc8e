//! Geometry helpers layered over the `geo` boolean engine.

use geo::{
    BooleanOps, BoundingRect, Coord, CoordsIter, Geometry, LineString, MultiLineString,
    MultiPolygon, Polygon, Rect,
};

/// Polygonal members of a geometry; points and lines are discarded.
pub fn polygonal_parts(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    let mut parts = Vec::new();
    collect_polygons(geometry, &mut parts);
    parts
}

fn collect_polygons(geometry: &Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p.clone()),
        Geometry::MultiPolygon(mp) => out.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for member in &gc.0 {
                collect_polygons(member, out);
            }
        }
        _ => {}
    }
}

/// Linear members of a geometry; points and polygons are discarded.
pub fn linear_parts(geometry: &Geometry<f64>) -> Vec<LineString<f64>> {
    let mut parts = Vec::new();
    collect_lines(geometry, &mut parts);
    parts
}

fn collect_lines(geometry: &Geometry<f64>, out: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::LineString(ls) => out.push(ls.clone()),
        Geometry::MultiLineString(mls) => out.extend(mls.0.iter().cloned()),
        Geometry::Line(l) => out.push(LineString::from(vec![l.start, l.end])),
        Geometry::GeometryCollection(gc) => {
            for member in &gc.0 {
                collect_lines(member, out);
            }
        }
        _ => {}
    }
}

/// Empty multi-polygon.
pub fn empty() -> MultiPolygon<f64> {
    MultiPolygon::new(Vec::new())
}

/// Re-node a polygon set through the boolean engine.
///
/// Equivalent to a zero-width buffer: self-intersecting rings are split into
/// valid parts and overlapping members are merged.
pub fn repair(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry.union(&empty())
}

/// Union of many polygon sets, merged pairwise in a balanced tree.
pub fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while parts.len() > 1 {
        let mut merged = Vec::with_capacity(parts.len() / 2 + 1);
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => merged.push(a.union(&b)),
                None => merged.push(a),
            }
        }
        parts = merged;
    }
    parts.pop().unwrap_or_else(empty)
}

/// Clip a polygon set to a rectangle.
pub fn clip_polygons(geometry: &MultiPolygon<f64>, rect: &Rect<f64>) -> MultiPolygon<f64> {
    geometry.intersection(&MultiPolygon::new(vec![rect.to_polygon()]))
}

/// Clip lines to a rectangle; lines leaving and re-entering become separate parts.
pub fn clip_lines(lines: &MultiLineString<f64>, rect: &Rect<f64>) -> MultiLineString<f64> {
    MultiPolygon::new(vec![rect.to_polygon()]).clip(lines, false)
}

/// Smallest rectangle covering every input rectangle.
pub fn combined_rect<I>(rects: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = Rect<f64>>,
{
    rects.into_iter().reduce(|acc, r| {
        Rect::new(
            Coord {
                x: acc.min().x.min(r.min().x),
                y: acc.min().y.min(r.min().y),
            },
            Coord {
                x: acc.max().x.max(r.max().x),
                y: acc.max().y.max(r.max().y),
            },
        )
    })
}

/// Bounding rectangle of a polygon set, `None` when it is empty.
pub fn polygon_envelope(geometry: &MultiPolygon<f64>) -> Option<Rect<f64>> {
    geometry.bounding_rect()
}

/// Whether every coordinate is finite.
pub fn all_finite<G: CoordsIter<Scalar = f64>>(geometry: &G) -> bool {
    geometry.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}
