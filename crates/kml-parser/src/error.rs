//! Error types for KML parsing operations.

use thiserror::Error;

/// Result type for KML parser operations.
pub type KmlResult<T> = Result<T, KmlError>;

/// Error types for KML parsing.
#[derive(Error, Debug)]
pub enum KmlError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed XML
    #[error("XML parsing error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    /// A `<coordinates>` element that cannot be read as lon,lat[,alt] tuples
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Invalid archive (.kmz / .zip)
    #[error("Invalid archive {path}: {message}")]
    InvalidArchive { path: String, message: String },

    /// Archive without any KML member
    #[error("No KML documents found in {0}")]
    NoDocuments(String),

    /// Requested folder/layer is not present
    #[error("Layer '{layer}' not found; available layers: {available:?}")]
    LayerNotFound {
        layer: String,
        available: Vec<String>,
    },

    /// Unsupported file extension
    #[error("Unsupported file type: {0} (expected .kml, .kmz or .zip)")]
    UnsupportedFileType(String),
}
