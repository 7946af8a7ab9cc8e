//! Coordinate reference system transformations.
//!
//! Implements map projections from scratch without external dependencies.

pub mod transverse_mercator;
pub mod utm;

pub use transverse_mercator::{normalize_longitude, Ellipsoid, TransverseMercator};
pub use utm::UtmProjection;

use thiserror::Error;

/// Errors raised when constructing a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("UTM zone out of range (1-60): {0}")]
    InvalidZone(u8),

    #[error("Unsupported EPSG code: {0}")]
    UnsupportedEpsg(u32),
}
