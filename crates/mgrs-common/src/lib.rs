//! Common types shared across the s2-orbits workspace.

pub mod crs;
pub mod error;
pub mod orbit;
pub mod tile;

pub use crs::{ZoneKey, ANTIMERIDIAN_ZONES, UTM_NORTH_EPSG_BASE, UTM_SOUTH_EPSG_BASE, WGS84_EPSG};
pub use error::{CommonError, CommonResult};
pub use orbit::RelativeOrbit;
pub use tile::TileId;
