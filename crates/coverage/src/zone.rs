//! Per-zone intersection of tiles with orbit footprints.
//!
//! Everything inside a zone happens in that zone's UTM plane: tiles and
//! footprints are projected, footprints are indexed in an R-tree by their
//! envelopes, each tile is intersected with the footprints it touches, and
//! the pieces are dissolved per (tile, orbit) before going back to lon/lat.

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon, Rect};
use mgrs_common::{RelativeOrbit, ZoneKey};
use projection::UtmProjection;
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, info};

use crate::error::{CoverageError, Result};
use crate::existence::ExistenceFilter;
use crate::footprint::Footprint;
use crate::ops::{all_finite, combined_rect, union_all};
use crate::reproject::{polygons_to_lonlat, polygons_to_utm};
use crate::types::{CoverageRecord, Tile};

/// A localized footprint stored in the zone's R-tree.
struct IndexedFootprint {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFootprint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Bounding rectangle of a zone's tiles, in lon/lat.
pub fn zone_bbox(tiles: &[&Tile]) -> Option<Rect<f64>> {
    combined_rect(tiles.iter().filter_map(|t| t.geometry.bounding_rect()))
}

/// Compute the coverage records of one zone.
///
/// Records come out in tile order, then orbit. With a filter, only
/// (tile, orbit) pairs present in it are kept.
///
/// # Errors
///
/// [`CoverageError::Geometry`] when a tile cannot be projected or projects
/// to a degenerate shape; callers treat that as a zone-level fault.
pub fn process_zone<F: Footprint>(
    key: ZoneKey,
    tiles: &[&Tile],
    footprints: &[F],
    filter: Option<&ExistenceFilter>,
    half_width: f64,
) -> Result<Vec<CoverageRecord>> {
    let bbox = zone_bbox(tiles)
        .ok_or_else(|| CoverageError::geometry(format!("zone {} has no tile geometry", key)))?;
    let utm = UtmProjection::new(key.zone, key.is_northern)?;

    let projected_tiles = project_tiles(tiles, &utm)?;

    // Localize footprints whose lon/lat envelope touches the zone
    let mut local: Vec<(RelativeOrbit, MultiPolygon<f64>)> = Vec::new();
    for footprint in footprints {
        let touches = footprint
            .envelope()
            .map(|env| env.intersects(&bbox))
            .unwrap_or(false);
        if !touches {
            continue;
        }
        if let Some(geometry) = footprint.localize(&bbox, &utm, half_width) {
            if !geometry.0.is_empty() {
                local.push((footprint.orbit(), geometry));
            }
        }
    }

    let index: RTree<IndexedFootprint> = RTree::bulk_load(
        local
            .iter()
            .enumerate()
            .filter_map(|(index, (_, geometry))| {
                geometry.bounding_rect().map(|rect| IndexedFootprint {
                    index,
                    envelope: aabb(&rect),
                })
            })
            .collect(),
    );

    let mut records = Vec::new();
    let mut pairs = 0usize;

    for (tile, tile_utm) in tiles.iter().zip(projected_tiles.iter()) {
        let Some(tile_rect) = tile_utm.bounding_rect() else {
            continue;
        };

        let mut pieces: BTreeMap<RelativeOrbit, Vec<MultiPolygon<f64>>> = BTreeMap::new();
        for candidate in index.locate_in_envelope_intersecting(&aabb(&tile_rect)) {
            let (orbit, geometry) = &local[candidate.index];
            if let Some(filter) = filter {
                if !filter.contains(&tile.id, *orbit) {
                    continue;
                }
            }
            if !tile_utm.intersects(geometry) {
                continue;
            }
            pairs += 1;
            pieces
                .entry(*orbit)
                .or_default()
                .push(tile_utm.intersection(geometry));
        }

        for (orbit, parts) in pieces {
            let dissolved = union_all(parts);
            let geometry = polygons_to_lonlat(&dissolved, &utm)?;
            records.push(CoverageRecord {
                tile_id: tile.id.clone(),
                orbit,
                zone: key,
                geometry,
            });
        }
    }

    debug!(zone = %key, footprints = local.len(), pairs, "Joined zone");
    info!(
        zone = %key,
        epsg = key.epsg(),
        tiles = tiles.len(),
        records = records.len(),
        "Processed zone"
    );
    Ok(records)
}

fn project_tiles(tiles: &[&Tile], utm: &UtmProjection) -> Result<Vec<MultiPolygon<f64>>> {
    tiles
        .iter()
        .map(|tile| {
            if !all_finite(&tile.geometry) {
                return Err(CoverageError::geometry(format!(
                    "tile {} has non-finite coordinates",
                    tile.id
                )));
            }
            let projected = polygons_to_utm(&tile.geometry, utm)
                .map_err(|e| CoverageError::geometry(format!("tile {}: {}", tile.id, e)))?;
            let area = projected.unsigned_area();
            if !area.is_finite() || area <= 0.0 {
                return Err(CoverageError::geometry(format!(
                    "tile {} is degenerate in EPSG:{}",
                    tile.id,
                    utm.epsg()
                )));
            }
            Ok(projected)
        })
        .collect()
}
