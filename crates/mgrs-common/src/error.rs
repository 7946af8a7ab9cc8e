//! Error types for the shared MGRS/UTM types.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised while parsing or validating shared identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    #[error("Invalid MGRS tile id '{id}': {reason}")]
    InvalidTileId { id: String, reason: String },

    #[error("UTM zone number out of range (1-60): {0}")]
    InvalidZone(u32),

    #[error("Invalid relative orbit: {0}")]
    InvalidOrbit(String),
}

impl CommonError {
    /// Create an InvalidTileId error.
    pub fn invalid_tile(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTileId {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
