//! Loading the tiling grid, ground tracks and acquisition plans into normalized tables.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use geo::{LineString, MultiLineString, MultiPolygon};
use kml_parser::{read_path, KmlDocument, KmlError, Placemark};
use mgrs_common::{RelativeOrbit, TileId};
use tracing::{info, warn};

use crate::error::{CoverageError, Result};
use crate::ops::{linear_parts, polygonal_parts, repair};
use crate::types::{AcquisitionSegment, GroundTrack, Tile};

/// Attribute names used by ESA acquisition plans.
pub const ATTR_ID: &str = "ID";
pub const ATTR_ORBIT: &str = "OrbitRelative";
pub const ATTR_START: &str = "ObservationTimeStart";
pub const ATTR_STOP: &str = "ObservationTimeStop";

/// Load the MGRS tiling grid from `layer` (normally `Features`).
///
/// Tile codes come from placemark names. Point and line members of a
/// tile's geometry are discarded; tiles left without a polygon are dropped
/// with a warning. A repeated tile code is a source-format error.
pub fn load_grid(path: &Path, layer: &str) -> Result<Vec<Tile>> {
    let origin = path.display().to_string();
    let documents = read_documents(path)?;
    let placemarks = select_layer(&documents, layer, &origin)?;

    let mut seen: HashSet<TileId> = HashSet::new();
    let mut tiles = Vec::with_capacity(placemarks.len());

    for (index, placemark) in placemarks.iter().enumerate() {
        let name = placemark.name.as_deref().ok_or_else(|| {
            CoverageError::source_format(&origin, format!("grid placemark #{} has no name", index))
        })?;
        let id = TileId::parse(name)
            .map_err(|e| CoverageError::source_format(&origin, e.to_string()))?;

        let polygons = placemark
            .geometry
            .as_ref()
            .map(polygonal_parts)
            .unwrap_or_default();
        if polygons.is_empty() {
            warn!(tile = %id, "Dropping tile without polygon geometry");
            continue;
        }

        if !seen.insert(id.clone()) {
            return Err(CoverageError::source_format(
                &origin,
                format!("duplicate tile id {}", id),
            ));
        }

        tiles.push(Tile {
            id,
            geometry: MultiPolygon::new(polygons),
        });
    }

    info!(path = %origin, tiles = tiles.len(), "Loaded tiling grid");
    Ok(tiles)
}

/// Load reference ground tracks, one per relative orbit, ordered by orbit.
///
/// The orbit comes from the `orbit_field` attribute, or from the placemark
/// name when the attribute is absent. Line features sharing an orbit are
/// merged into one multi-line in source order. `layer = None` reads every
/// placemark of the file.
pub fn load_ground_tracks(
    path: &Path,
    layer: Option<&str>,
    orbit_field: &str,
) -> Result<Vec<GroundTrack>> {
    let origin = path.display().to_string();
    let documents = read_documents(path)?;
    let placemarks: Vec<&Placemark> = match layer {
        Some(layer) => select_layer(&documents, layer, &origin)?,
        None => documents.iter().flat_map(|d| d.placemarks.iter()).collect(),
    };

    let mut by_orbit: BTreeMap<RelativeOrbit, Vec<LineString<f64>>> = BTreeMap::new();
    let mut features = 0usize;

    for (index, placemark) in placemarks.iter().enumerate() {
        let orbit = track_orbit(placemark, orbit_field).ok_or_else(|| {
            CoverageError::source_format(
                &origin,
                format!(
                    "ground track #{} ({}) has no usable '{}' attribute or numeric name",
                    index,
                    placemark.name.as_deref().unwrap_or("unnamed"),
                    orbit_field
                ),
            )
        })?;

        let lines = placemark
            .geometry
            .as_ref()
            .map(linear_parts)
            .unwrap_or_default();
        if lines.is_empty() {
            return Err(CoverageError::source_format(
                &origin,
                format!("ground track for orbit {} has no line geometry", orbit),
            ));
        }

        by_orbit.entry(orbit).or_default().extend(lines);
        features += 1;
    }

    let tracks: Vec<GroundTrack> = by_orbit
        .into_iter()
        .map(|(orbit, lines)| GroundTrack {
            orbit,
            geometry: MultiLineString::new(lines),
        })
        .collect();

    info!(
        path = %origin,
        features,
        orbits = tracks.len(),
        "Loaded ground tracks"
    );
    Ok(tracks)
}

/// Load acquisition segments from every path, in input order.
pub fn load_acquisitions<P: AsRef<Path>>(paths: &[P], layer: &str) -> Result<Vec<AcquisitionSegment>> {
    let mut segments = Vec::new();
    for path in paths {
        segments.extend(load_acquisition_file(path.as_ref(), layer)?);
    }
    Ok(segments)
}

/// Load the acquisition segments of a single plan file or archive.
///
/// Footprints are repaired through the boolean engine; segments that repair
/// to nothing are dropped with a warning.
pub fn load_acquisition_file(path: &Path, layer: &str) -> Result<Vec<AcquisitionSegment>> {
    let origin = path.display().to_string();
    let documents = read_documents(path)?;
    let placemarks = select_layer(&documents, layer, &origin)?;

    let mut segments = Vec::with_capacity(placemarks.len());
    for (index, placemark) in placemarks.iter().enumerate() {
        let id = required_attribute(placemark, ATTR_ID, index, &origin)?.to_string();
        let orbit_text = required_attribute(placemark, ATTR_ORBIT, index, &origin)?;
        let orbit: RelativeOrbit = orbit_text
            .parse()
            .map_err(|e: mgrs_common::CommonError| {
                CoverageError::source_format(&origin, format!("segment {}: {}", id, e))
            })?;

        let polygons = placemark
            .geometry
            .as_ref()
            .map(polygonal_parts)
            .unwrap_or_default();
        if polygons.is_empty() {
            return Err(CoverageError::source_format(
                &origin,
                format!("segment {} has no polygon geometry", id),
            ));
        }

        let geometry = repair(&MultiPolygon::new(polygons));
        if geometry.0.is_empty() {
            warn!(segment = %id, orbit = %orbit, "Dropping acquisition segment with empty footprint");
            continue;
        }

        segments.push(AcquisitionSegment {
            id,
            orbit,
            geometry,
            observation_start: placemark.attribute(ATTR_START).map(str::to_string),
            observation_stop: placemark.attribute(ATTR_STOP).map(str::to_string),
        });
    }

    info!(path = %origin, segments = segments.len(), "Loaded acquisition plan");
    Ok(segments)
}

fn read_documents(path: &Path) -> Result<Vec<KmlDocument>> {
    read_path(path).map_err(|e| match e {
        KmlError::IoError(io) => {
            CoverageError::config(format!("cannot read {}: {}", path.display(), io))
        }
        KmlError::UnsupportedFileType(_) => CoverageError::config(e.to_string()),
        other => other.into(),
    })
}

/// Placemarks of `layer` across all documents of one source.
fn select_layer<'d>(
    documents: &'d [KmlDocument],
    layer: &str,
    origin: &str,
) -> Result<Vec<&'d Placemark>> {
    let mut selected = Vec::new();
    let mut found = false;
    for document in documents {
        if let Ok(placemarks) = document.layer(layer) {
            found = true;
            selected.extend(placemarks);
        }
    }

    if !found {
        let available: Vec<String> = documents.iter().flat_map(|d| d.layers()).collect();
        return Err(CoverageError::config(format!(
            "layer '{}' not found in {} (available: {})",
            layer,
            origin,
            available.join(", ")
        )));
    }
    Ok(selected)
}

fn required_attribute<'p>(
    placemark: &'p Placemark,
    key: &str,
    index: usize,
    origin: &str,
) -> Result<&'p str> {
    placemark.attribute(key).ok_or_else(|| {
        CoverageError::source_format(
            origin,
            format!("placemark #{} is missing the '{}' attribute", index, key),
        )
    })
}

fn track_orbit(placemark: &Placemark, orbit_field: &str) -> Option<RelativeOrbit> {
    if let Some(value) = placemark.attribute(orbit_field) {
        return value.parse().ok();
    }
    placemark
        .name
        .as_deref()
        .and_then(|name| name.trim().parse::<u8>().ok())
        .map(RelativeOrbit)
}
