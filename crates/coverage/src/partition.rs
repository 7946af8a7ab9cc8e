//! Grouping tiles by UTM zone and hemisphere.

use std::collections::{BTreeMap, BTreeSet};

use mgrs_common::ZoneKey;
use tracing::{info, warn};

use crate::types::{SkipReason, SkippedZone, Tile};

/// Tiles grouped per zone key, plus the zones excluded up front.
#[derive(Debug, Default)]
pub struct ZonePartition<'a> {
    pub groups: BTreeMap<ZoneKey, Vec<&'a Tile>>,
    pub skipped: Vec<SkippedZone>,
}

impl<'a> ZonePartition<'a> {
    /// Zone keys to process, in order.
    pub fn keys(&self) -> Vec<ZoneKey> {
        self.groups.keys().copied().collect()
    }

    /// Tiles held by groups and skipped entries together.
    pub fn tile_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum::<usize>()
            + self.skipped.iter().map(|s| s.tiles.len()).sum::<usize>()
    }
}

/// Partition tiles by `(zone, hemisphere)`.
///
/// Zones listed in `skip_zones` (both hemispheres) are not grouped; each
/// such zone key becomes one `SkippedZone` with reason `Antimeridian`.
pub fn partition_by_zone<'a>(tiles: &'a [Tile], skip_zones: &BTreeSet<u8>) -> ZonePartition<'a> {
    let mut all: BTreeMap<ZoneKey, Vec<&'a Tile>> = BTreeMap::new();
    for tile in tiles {
        all.entry(tile.zone_key()).or_default().push(tile);
    }

    let mut partition = ZonePartition::default();
    for (key, group) in all {
        if skip_zones.contains(&key.zone) {
            warn!(
                zone = %key,
                tiles = group.len(),
                "Skipping antimeridian zone"
            );
            partition.skipped.push(SkippedZone {
                key,
                reason: SkipReason::Antimeridian,
                tiles: group.iter().map(|t| t.id.clone()).collect(),
            });
        } else {
            partition.groups.insert(key, group);
        }
    }

    info!(
        zones = partition.groups.len(),
        skipped = partition.skipped.len(),
        tiles = tiles.len(),
        "Partitioned tiles by zone"
    );
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, MultiPolygon, Polygon};
    use mgrs_common::TileId;
    use test_utils::square_ring;

    fn tile(code: &str) -> Tile {
        Tile {
            id: TileId::parse(code).unwrap(),
            geometry: MultiPolygon::new(vec![Polygon::new(
                LineString::from(square_ring(0.0, 0.0, 1.0)),
                Vec::new(),
            )]),
        }
    }

    #[test]
    fn test_partition_covers_every_tile_once() {
        let tiles: Vec<Tile> = ["33UUU", "33UVU", "33HXC", "01CCV", "60WWT", "32TNS", "60CWS"]
            .iter()
            .map(|c| tile(c))
            .collect();
        let skip: BTreeSet<u8> = [1, 60].into_iter().collect();
        let partition = partition_by_zone(&tiles, &skip);

        assert_eq!(partition.tile_count(), tiles.len());

        let keys: Vec<String> = partition.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["32N", "33S", "33N"]);
        assert_eq!(partition.groups[&ZoneKey::new(33, true).unwrap()].len(), 2);

        let skipped: Vec<String> = partition.skipped.iter().map(|s| s.key.to_string()).collect();
        assert_eq!(skipped, vec!["01S", "60S", "60N"]);
        assert!(partition
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::Antimeridian));
    }

    #[test]
    fn test_empty_skip_set() {
        let tiles = vec![tile("01CCV"), tile("60WWT")];
        let partition = partition_by_zone(&tiles, &BTreeSet::new());
        assert_eq!(partition.groups.len(), 2);
        assert!(partition.skipped.is_empty());
    }
}
