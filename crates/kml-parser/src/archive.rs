//! File-level entry points: plain `.kml`, zipped `.kmz` and `.zip` bundles.
//!
//! ESA publishes acquisition plans either as bare KML or as a zip holding
//! several KML members. Every `.kml` member is parsed, in archive order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::document::KmlDocument;
use crate::error::{KmlError, KmlResult};

/// Read every KML document contained in `path`.
///
/// `.kml` files yield a single document; `.kmz` and `.zip` archives yield one
/// document per `.kml` member and fail with `NoDocuments` when there is none.
pub fn read_path(path: &Path) -> KmlResult<Vec<KmlDocument>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "kml" => {
            let file = File::open(path)?;
            let document = KmlDocument::from_reader(BufReader::new(file))?;
            debug!(
                path = %path.display(),
                placemarks = document.placemarks.len(),
                "Parsed KML file"
            );
            Ok(vec![document])
        }
        "kmz" | "zip" => read_archive(path),
        _ => Err(KmlError::UnsupportedFileType(path.display().to_string())),
    }
}

/// Whether a path looks like something `read_path` accepts.
pub fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("kml") | Some("kmz") | Some("zip")
    )
}

fn read_archive(path: &Path) -> KmlResult<Vec<KmlDocument>> {
    let invalid = |message: String| KmlError::InvalidArchive {
        path: path.display().to_string(),
        message,
    };

    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| invalid(e.to_string()))?;

    let mut documents = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(|e| invalid(e.to_string()))?;
        if member.is_dir() || !member.name().to_ascii_lowercase().ends_with(".kml") {
            continue;
        }

        let name = member.name().to_string();
        let mut bytes = Vec::with_capacity(member.size() as usize);
        member.read_to_end(&mut bytes)?;

        let document = KmlDocument::from_reader(bytes.as_slice())?;
        debug!(member = %name, placemarks = document.placemarks.len(), "Parsed archive member");
        documents.push(document);
    }

    if documents.is_empty() {
        return Err(KmlError::NoDocuments(path.display().to_string()));
    }

    info!(
        path = %path.display(),
        documents = documents.len(),
        "Read KML archive"
    );
    Ok(documents)
}
