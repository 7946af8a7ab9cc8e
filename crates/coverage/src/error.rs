//! Error types for coverage computation.

use thiserror::Error;

use kml_parser::KmlError;
use mgrs_common::CommonError;
use projection::ProjectionError;

/// Errors that can occur while computing tile/orbit coverage.
///
/// Only [`CoverageError::Geometry`] is recoverable: the engine skips the
/// affected zone and reports it. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum CoverageError {
    /// Invalid configuration or unusable input path.
    #[error("configuration error: {0}")]
    Config(String),

    /// A source file that does not have the expected structure.
    #[error("source format error in {origin}: {message}")]
    SourceFormat { origin: String, message: String },

    /// Non-finite coordinates, out-of-domain projection or degenerate geometry.
    #[error("geometry fault: {0}")]
    Geometry(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// KML parsing error.
    #[error("KML error: {0}")]
    Kml(#[from] KmlError),

    /// Invalid tile code, zone or orbit.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Projection setup error.
    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Catalog CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Arrow error while assembling output batches.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet writer error.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// The run was cancelled through its cancellation flag.
    #[error("run cancelled")]
    Cancelled,
}

impl CoverageError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a SourceFormat error.
    pub fn source_format(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFormat {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a Geometry fault.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Whether this error only invalidates the zone being processed.
    pub fn is_geometry_fault(&self) -> bool {
        matches!(self, Self::Geometry(_))
    }
}

/// Result type for coverage operations.
pub type Result<T> = std::result::Result<T, CoverageError>;
