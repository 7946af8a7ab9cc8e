//! KML and catalog fixtures shaped like the ESA Sentinel-2 products.
//!
//! - The tiling grid KML has a `Features` folder whose placemarks are named by
//!   tile code and carry a `MultiGeometry` of polygon(s) plus a centroid point,
//!   all with an altitude component.
//! - Acquisition plans have a `NOMINAL` folder with polygon placemarks and
//!   `ID` / `OrbitRelative` / timing attributes in `ExtendedData`.
//! - Ground tracks are line placemarks with an `OrbitRelative` attribute.

use std::fmt::Write;

/// Format a coordinate list as KML `lon,lat,alt` tuples.
pub fn kml_coordinates(coords: &[(f64, f64)]) -> String {
    coords
        .iter()
        .map(|(lon, lat)| format!("{},{},0", lon, lat))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap placemarks into a KML document with a single named folder.
pub fn kml_document(folder: &str, placemarks: &[String]) -> String {
    let mut doc = String::new();
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n");
    let _ = writeln!(doc, "<Folder>\n<name>{}</name>", folder);
    for placemark in placemarks {
        doc.push_str(placemark);
        doc.push('\n');
    }
    doc.push_str("</Folder>\n</Document>\n</kml>\n");
    doc
}

fn polygon_xml(ring: &[(f64, f64)]) -> String {
    format!(
        "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs></Polygon>",
        kml_coordinates(ring)
    )
}

fn extended_data(pairs: &[(&str, String)]) -> String {
    let mut xml = String::from("<ExtendedData>");
    for (name, value) in pairs {
        let _ = write!(xml, "<Data name=\"{}\"><value>{}</value></Data>", name, value);
    }
    xml.push_str("</ExtendedData>");
    xml
}

/// Grid placemark: polygon(s) plus the centroid point artifact.
pub fn grid_placemark(code: &str, rings: &[Vec<(f64, f64)>]) -> String {
    let mut geometry = String::from("<MultiGeometry>");
    let mut sum = (0.0, 0.0);
    let mut count = 0.0;
    for ring in rings {
        geometry.push_str(&polygon_xml(ring));
        for (lon, lat) in ring {
            sum.0 += lon;
            sum.1 += lat;
            count += 1.0;
        }
    }
    if count > 0.0 {
        let _ = write!(
            geometry,
            "<Point><coordinates>{},{},0</coordinates></Point>",
            sum.0 / count,
            sum.1 / count
        );
    }
    geometry.push_str("</MultiGeometry>");

    format!(
        "<Placemark><name>{}</name>{}{}</Placemark>",
        code,
        extended_data(&[("TILE_ID", code.to_string()), ("EPSG", "0".to_string())]),
        geometry
    )
}

/// Ground-track placemark: a line with an `OrbitRelative` attribute.
pub fn track_placemark(orbit: u8, coords: &[(f64, f64)]) -> String {
    format!(
        "<Placemark><name>Orbit {}</name>{}<LineString><coordinates>{}</coordinates></LineString></Placemark>",
        orbit,
        extended_data(&[("OrbitRelative", orbit.to_string())]),
        kml_coordinates(coords)
    )
}

/// Acquisition placemark: a footprint polygon with id, orbit and timing attributes.
pub fn acquisition_placemark(id: &str, orbit: u8, ring: &[(f64, f64)]) -> String {
    format!(
        "<Placemark><name>{}</name>{}{}</Placemark>",
        id,
        extended_data(&[
            ("ID", id.to_string()),
            ("OrbitRelative", orbit.to_string()),
            ("ObservationTimeStart", "2020-07-28T10:20:31".to_string()),
            ("ObservationTimeStop", "2020-07-28T10:24:12".to_string()),
        ]),
        polygon_xml(ring)
    )
}

/// A Sentinel-2 L1C product id with the relative orbit embedded as `_Rnnn_`.
pub fn product_id(tile: &str, orbit: u8, day: u32) -> String {
    format!(
        "S2A_MSIL1C_202001{:02}T101411_N0208_R{:03}_T{}_202001{:02}T121325",
        day, orbit, tile, day
    )
}

/// Catalog CSV in the layout of the public Sentinel-2 index.
pub fn catalog_csv(rows: &[(String, String)]) -> String {
    let mut csv = String::from("GRANULE_ID,PRODUCT_ID,DATATAKE_IDENTIFIER,MGRS_TILE,SENSING_TIME,CLOUD_COVER\n");
    for (i, (product, tile)) in rows.iter().enumerate() {
        let _ = writeln!(
            csv,
            "L1C_T{}_A{:06},{},GS2A_20200101T101411_023742_N02.08,{},2020-01-01T10:19:01.000Z,{}",
            tile,
            i,
            product,
            tile,
            i % 100
        );
    }
    csv
}
