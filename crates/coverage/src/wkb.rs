//! Well-Known Binary encoding for the output geometry column.

use geo::{LineString, MultiPolygon, Polygon};

const LITTLE_ENDIAN: u8 = 1;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOLYGON: u32 = 6;

/// Encode a multi-polygon as little-endian 2-D WKB.
pub fn encode_multipolygon(geometry: &MultiPolygon<f64>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(encoded_len(geometry));
    write_header(&mut buf, WKB_MULTIPOLYGON);
    write_u32(&mut buf, geometry.0.len() as u32);
    for polygon in &geometry.0 {
        write_polygon(&mut buf, polygon);
    }
    buf
}

fn encoded_len(geometry: &MultiPolygon<f64>) -> usize {
    9 + geometry
        .0
        .iter()
        .map(|p| {
            9 + std::iter::once(p.exterior())
                .chain(p.interiors())
                .map(|r| 4 + 16 * r.0.len())
                .sum::<usize>()
        })
        .sum::<usize>()
}

fn write_header(buf: &mut Vec<u8>, geometry_type: u32) {
    buf.push(LITTLE_ENDIAN);
    write_u32(buf, geometry_type);
}

fn write_polygon(buf: &mut Vec<u8>, polygon: &Polygon<f64>) {
    write_header(buf, WKB_POLYGON);
    write_u32(buf, 1 + polygon.interiors().len() as u32);
    write_ring(buf, polygon.exterior());
    for ring in polygon.interiors() {
        write_ring(buf, ring);
    }
}

fn write_ring(buf: &mut Vec<u8>, ring: &LineString<f64>) {
    write_u32(buf, ring.0.len() as u32);
    for c in &ring.0 {
        buf.extend_from_slice(&c.x.to_le_bytes());
        buf.extend_from_slice(&c.y.to_le_bytes());
    }
}

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}
