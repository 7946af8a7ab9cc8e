//! Streaming KML reader for Sentinel-2 products.
//!
//! Parses the three kinds of KML the coverage pipeline consumes:
//!
//! - the MGRS tiling grid (`Features` folder, one placemark per tile),
//! - reference ground tracks (one LineString per relative orbit),
//! - acquisition plans (`NOMINAL` folder, one polygon per segment), which
//!   are often shipped zipped.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use kml_parser::read_path;
//!
//! let documents = read_path(Path::new("S2A_acquisition_plan.zip"))?;
//! for doc in &documents {
//!     for placemark in doc.layer("NOMINAL")? {
//!         println!("{:?} {:?}", placemark.name, placemark.attribute("OrbitRelative"));
//!     }
//! }
//! # Ok::<(), kml_parser::KmlError>(())
//! ```

pub mod archive;
pub mod document;
pub mod error;

pub use archive::{is_supported, read_path};
pub use document::{parse_coordinates, KmlDocument, Placemark};
pub use error::{KmlError, KmlResult};
