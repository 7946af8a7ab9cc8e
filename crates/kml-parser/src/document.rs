//! KML document model and streaming parser.
//!
//! Only the subset of KML used by the Sentinel-2 products is interpreted:
//! `Document`/`Folder` names (used as layer names), `Placemark` names,
//! `ExtendedData` (`Data`/`value` and `SchemaData`/`SimpleData`) and the
//! geometry elements `Point`, `LineString`, `LinearRing`, `Polygon` and
//! `MultiGeometry`. Styles, descriptions and everything else are skipped.
//!
//! Coordinates are read as `lon,lat[,alt]`; the altitude is discarded.

use std::collections::BTreeMap;
use std::io::BufRead;

use geo::{Coord, Geometry, GeometryCollection, LineString, Point, Polygon};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{KmlError, KmlResult};

/// A single KML placemark.
#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    /// Placemark `<name>`
    pub name: Option<String>,
    /// Names of the enclosing Document/Folder elements, outermost first
    pub folders: Vec<String>,
    /// ExtendedData attributes
    pub attributes: BTreeMap<String, String>,
    /// Geometry with the altitude dropped; MultiGeometry becomes a GeometryCollection
    pub geometry: Option<Geometry<f64>>,
}

impl Placemark {
    /// Innermost enclosing folder name.
    pub fn layer(&self) -> Option<&str> {
        self.folders.last().map(String::as_str)
    }

    /// Whether any enclosing Document/Folder carries this name.
    pub fn in_layer(&self, layer: &str) -> bool {
        self.folders.iter().any(|f| f == layer)
    }

    /// Look up an ExtendedData attribute, falling back to a case-insensitive match.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.attributes.get(key) {
            return Some(value.as_str());
        }
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed KML document.
#[derive(Debug, Clone, Default)]
pub struct KmlDocument {
    pub placemarks: Vec<Placemark>,
}

impl KmlDocument {
    /// Parse a document held in memory.
    pub fn parse_str(xml: &str) -> KmlResult<Self> {
        Self::from_reader(xml.as_bytes())
    }

    /// Parse a document from any buffered reader.
    pub fn from_reader<R: BufRead>(reader: R) -> KmlResult<Self> {
        Parser::default().run(reader)
    }

    /// Distinct folder names, in document order.
    pub fn layers(&self) -> Vec<String> {
        let mut layers: Vec<String> = Vec::new();
        for placemark in &self.placemarks {
            for folder in &placemark.folders {
                if !layers.contains(folder) {
                    layers.push(folder.clone());
                }
            }
        }
        layers
    }

    /// Placemarks inside the named layer.
    ///
    /// Returns `LayerNotFound` when no Document/Folder carries the name.
    pub fn layer(&self, name: &str) -> KmlResult<Vec<&Placemark>> {
        let selected: Vec<&Placemark> = self
            .placemarks
            .iter()
            .filter(|p| p.in_layer(name))
            .collect();

        if selected.is_empty() && !self.layers().iter().any(|l| l == name) {
            return Err(KmlError::LayerNotFound {
                layer: name.to_string(),
                available: self.layers(),
            });
        }
        Ok(selected)
    }
}

/// Geometry under construction.
enum Frame {
    Multi(Vec<Geometry<f64>>),
    Polygon {
        exterior: Option<LineString<f64>>,
        interiors: Vec<LineString<f64>>,
    },
    Point(Vec<Coord<f64>>),
    Line(Vec<Coord<f64>>),
    Ring(Vec<Coord<f64>>),
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Outer,
    Inner,
}

#[derive(Default)]
struct PlacemarkBuilder {
    name: Option<String>,
    attributes: BTreeMap<String, String>,
    geometry: Option<Geometry<f64>>,
    data_name: Option<String>,
    simple_data_name: Option<String>,
}

#[derive(Default)]
struct Parser {
    /// Local names of the open elements
    path: Vec<Vec<u8>>,
    /// Open Document/Folder elements and their names once seen
    containers: Vec<Option<String>>,
    placemark: Option<PlacemarkBuilder>,
    frames: Vec<Frame>,
    boundary: Option<Boundary>,
    text: String,
    placemarks: Vec<Placemark>,
}

impl Parser {
    fn run<R: BufRead>(mut self, input: R) -> KmlResult<KmlDocument> {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => self.start(&e)?,
                Ok(Event::Empty(e)) => {
                    self.start(&e)?;
                    let local = e.local_name().as_ref().to_vec();
                    self.end(&local)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| KmlError::Xml {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })?;
                    self.text.push_str(&text);
                }
                Ok(Event::CData(c)) => {
                    self.text.push_str(&String::from_utf8_lossy(&c));
                }
                Ok(Event::End(e)) => {
                    let local = e.local_name().as_ref().to_vec();
                    self.end(&local)?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(KmlError::Xml {
                        position: reader.buffer_position(),
                        message: e.to_string(),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(KmlDocument {
            placemarks: self.placemarks,
        })
    }

    fn start(&mut self, e: &BytesStart<'_>) -> KmlResult<()> {
        let local = e.local_name().as_ref().to_vec();
        self.text.clear();

        match local.as_slice() {
            b"Document" | b"Folder" => self.containers.push(None),
            b"Placemark" => self.placemark = Some(PlacemarkBuilder::default()),
            b"Data" => {
                let name = name_attribute(e)?;
                if let Some(pm) = self.placemark.as_mut() {
                    pm.data_name = name;
                }
            }
            b"SimpleData" => {
                let name = name_attribute(e)?;
                if let Some(pm) = self.placemark.as_mut() {
                    pm.simple_data_name = name;
                }
            }
            b"MultiGeometry" => self.frames.push(Frame::Multi(Vec::new())),
            b"Polygon" => self.frames.push(Frame::Polygon {
                exterior: None,
                interiors: Vec::new(),
            }),
            b"Point" => self.frames.push(Frame::Point(Vec::new())),
            b"LineString" => self.frames.push(Frame::Line(Vec::new())),
            b"LinearRing" => self.frames.push(Frame::Ring(Vec::new())),
            b"outerBoundaryIs" => self.boundary = Some(Boundary::Outer),
            b"innerBoundaryIs" => self.boundary = Some(Boundary::Inner),
            _ => {}
        }

        self.path.push(local);
        Ok(())
    }

    fn end(&mut self, local: &[u8]) -> KmlResult<()> {
        self.path.pop();
        let parent = self.path.last().cloned().unwrap_or_default();

        match local {
            b"name" => {
                let text = std::mem::take(&mut self.text).trim().to_string();
                match parent.as_slice() {
                    b"Placemark" => {
                        if let Some(pm) = self.placemark.as_mut() {
                            pm.name = Some(text);
                        }
                    }
                    b"Folder" | b"Document" => {
                        if let Some(container) = self.containers.last_mut() {
                            *container = Some(text);
                        }
                    }
                    _ => {}
                }
            }
            b"value" if parent.as_slice() == b"Data" => {
                let text = std::mem::take(&mut self.text).trim().to_string();
                if let Some(pm) = self.placemark.as_mut() {
                    if let Some(key) = pm.data_name.clone() {
                        pm.attributes.insert(key, text);
                    }
                }
            }
            b"Data" => {
                if let Some(pm) = self.placemark.as_mut() {
                    pm.data_name = None;
                }
            }
            b"SimpleData" => {
                let text = std::mem::take(&mut self.text).trim().to_string();
                if let Some(pm) = self.placemark.as_mut() {
                    if let Some(key) = pm.simple_data_name.take() {
                        pm.attributes.insert(key, text);
                    }
                }
            }
            b"coordinates" => {
                let coords = parse_coordinates(&std::mem::take(&mut self.text))?;
                match self.frames.last_mut() {
                    Some(Frame::Point(c)) | Some(Frame::Line(c)) | Some(Frame::Ring(c)) => {
                        c.extend(coords)
                    }
                    _ => debug!("Ignoring coordinates outside of a geometry element"),
                }
            }
            b"outerBoundaryIs" | b"innerBoundaryIs" => self.boundary = None,
            b"Point" | b"LineString" | b"LinearRing" | b"Polygon" | b"MultiGeometry" => {
                if let Some(frame) = self.frames.pop() {
                    self.finish_frame(frame);
                }
            }
            b"Placemark" => {
                if let Some(pm) = self.placemark.take() {
                    let folders = self.containers.iter().flatten().cloned().collect();
                    self.placemarks.push(Placemark {
                        name: pm.name,
                        folders,
                        attributes: pm.attributes,
                        geometry: pm.geometry,
                    });
                }
            }
            b"Document" | b"Folder" => {
                self.containers.pop();
            }
            _ => {}
        }

        Ok(())
    }

    fn finish_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Ring(coords) => {
                let ring = LineString::from(coords);
                let boundary = self.boundary;
                if let Some(Frame::Polygon {
                    exterior,
                    interiors,
                }) = self.frames.last_mut()
                {
                    match boundary {
                        Some(Boundary::Inner) => interiors.push(ring),
                        _ if exterior.is_none() => *exterior = Some(ring),
                        _ => interiors.push(ring),
                    }
                    return;
                }
                self.attach(Geometry::LineString(ring));
            }
            Frame::Point(coords) => match coords.first() {
                Some(c) => self.attach(Geometry::Point(Point(*c))),
                None => debug!("Skipping empty Point"),
            },
            Frame::Line(coords) => self.attach(Geometry::LineString(LineString::from(coords))),
            Frame::Polygon {
                exterior,
                interiors,
            } => match exterior {
                Some(exterior) => self.attach(Geometry::Polygon(Polygon::new(exterior, interiors))),
                None => debug!("Skipping Polygon without an outer boundary"),
            },
            Frame::Multi(children) => {
                self.attach(Geometry::GeometryCollection(GeometryCollection(children)))
            }
        }
    }

    fn attach(&mut self, geometry: Geometry<f64>) {
        if let Some(Frame::Multi(children)) = self.frames.last_mut() {
            children.push(geometry);
        } else if let Some(pm) = self.placemark.as_mut() {
            pm.geometry = Some(geometry);
        } else {
            debug!("Ignoring geometry outside of a Placemark");
        }
    }
}

fn name_attribute(e: &BytesStart<'_>) -> KmlResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| KmlError::Xml {
            position: 0,
            message: err.to_string(),
        })?;
        if attr.key.as_ref() == b"name" {
            return Ok(Some(String::from_utf8_lossy(&attr.value).trim().to_string()));
        }
    }
    Ok(None)
}

/// Parse a KML coordinate list ("lon,lat[,alt] lon,lat[,alt] ...").
///
/// The altitude component is dropped without validation.
pub fn parse_coordinates(text: &str) -> KmlResult<Vec<Coord<f64>>> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let x = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
            let y = parts.next().and_then(|v| v.trim().parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(KmlError::InvalidCoordinates(tuple.to_string())),
            }
        })
        .collect()
}
