//! GML reading: builds a small element tree with `quick-xml`, then pulls
//! features, their simple properties and their geometries out of it.
//!
//! Element and attribute names are matched on their local part, so the
//! namespace prefixes a service chooses (`gml:`, `gsml:`, `wfs:`...) don't matter.

use crate::utils::error::{ProxyError, Result};
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Deepest element nesting accepted from an upstream document.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search for the first descendant with the given local name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

pub fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(ProxyError::ConversionError {
                        message: format!("elements nested deeper than {} levels", MAX_DEPTH),
                    });
                }
                stack.push(Element::from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(end) => {
                let element = stack.pop().ok_or_else(|| {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    quick_xml::Error::IllFormed(IllFormedError::UnmatchedEndTag(name))
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(open.name)).into());
    }

    root.ok_or_else(|| ProxyError::ConversionError {
        message: "document has no root element".to_string(),
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ProxyError::ConversionError {
                message: "document has more than one root element".to_string(),
            })
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    LineString(Vec<Coordinate>),
    Polygon {
        exterior: Vec<Coordinate>,
        interiors: Vec<Vec<Coordinate>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: String,
    pub type_name: String,
    pub properties: Vec<(String, String)>,
    pub geometries: Vec<Geometry>,
}

impl Feature {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

const EXCEPTION_REPORTS: &[&str] = &["ExceptionReport", "ServiceExceptionReport"];
const MEMBER_ELEMENTS: &[&str] = &["featureMember", "member"];
const COLLECTION_ELEMENTS: &[&str] = &["FeatureCollection", "featureCollection"];
const GEOMETRY_ELEMENTS: &[&str] = &[
    "Point",
    "LineString",
    "Polygon",
    "MultiPoint",
    "MultiLineString",
    "MultiCurve",
    "MultiPolygon",
    "MultiSurface",
    "MultiGeometry",
    "Curve",
    "CompositeCurve",
    "Surface",
    "CompositeSurface",
];

/// Geographic CRS codes whose EPSG axis order is latitude first.
const LAT_LON_EPSG_CODES: &[&str] = &["4326", "4283", "4258", "4269", "4979", "7844"];

/// Fails with `ServiceException` when the document is an OWS exception report.
pub fn check_exception_report(root: &Element) -> Result<()> {
    if !EXCEPTION_REPORTS.contains(&root.name.as_str()) {
        return Ok(());
    }

    let message = root
        .find("ExceptionText")
        .or_else(|| root.find("ServiceException"))
        .or_else(|| root.find("Exception"))
        .map(|e| e.trimmed_text().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "unknown service exception".to_string());

    Err(ProxyError::ServiceException { message })
}

pub fn extract_features(root: &Element) -> Result<Vec<Feature>> {
    let mut members: Vec<&Element> = Vec::new();
    for child in &root.children {
        if MEMBER_ELEMENTS.contains(&child.name.as_str()) || child.name == "featureMembers" {
            members.extend(child.children.iter());
        }
    }

    if members.is_empty() && !COLLECTION_ELEMENTS.contains(&root.name.as_str()) {
        members.push(root);
    }

    members
        .into_iter()
        .enumerate()
        .map(|(index, element)| parse_feature(element, index + 1))
        .collect()
}

fn parse_feature(element: &Element, ordinal: usize) -> Result<Feature> {
    let id = element
        .attr("id")
        .or_else(|| element.attr("fid"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("feature-{}", ordinal));

    let mut feature = Feature {
        id,
        type_name: element.name.clone(),
        properties: Vec::new(),
        geometries: Vec::new(),
    };
    walk_feature(element, &mut feature, &SrsContext::from_element(element, None))?;
    Ok(feature)
}

fn walk_feature(element: &Element, feature: &mut Feature, srs: &SrsContext) -> Result<()> {
    for child in &element.children {
        let name = child.name.as_str();
        if name == "boundedBy" {
            continue;
        }
        if GEOMETRY_ELEMENTS.contains(&name) {
            collect_geometries(child, srs, &mut feature.geometries)?;
        } else if child.children.is_empty() {
            let value = match child.trimmed_text() {
                "" => child.attr("href").unwrap_or_default(),
                text => text,
            };
            if !value.is_empty() {
                feature.properties.push((child.name.clone(), value.to_string()));
            }
        } else {
            walk_feature(child, feature, &SrsContext::from_element(child, Some(srs)))?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct SrsContext {
    srs_name: Option<String>,
    dimension: Option<usize>,
}

impl SrsContext {
    fn from_element(element: &Element, parent: Option<&SrsContext>) -> Self {
        let inherited = parent.cloned().unwrap_or_default();
        Self {
            srs_name: element
                .attr("srsName")
                .map(str::to_string)
                .or(inherited.srs_name),
            dimension: element
                .attr("srsDimension")
                .and_then(|d| d.trim().parse().ok())
                .or(inherited.dimension),
        }
    }

    fn lat_lon_order(&self) -> bool {
        self.srs_name.as_deref().is_some_and(is_lat_lon_srs)
    }

    /// Puts coordinates read under this context into lon/lat order.
    fn oriented(&self, mut coords: Vec<Coordinate>) -> Vec<Coordinate> {
        if self.lat_lon_order() {
            for c in &mut coords {
                std::mem::swap(&mut c.x, &mut c.y);
            }
        }
        coords
    }
}

/// URN and `/def/crs/` URI forms of geographic EPSG codes follow the EPSG
/// axis order (lat/lon). Bare `EPSG:4326` and the old `epsg.xml#4326` form
/// are lon/lat.
pub fn is_lat_lon_srs(srs_name: &str) -> bool {
    let srs = srs_name.trim().to_ascii_lowercase();
    if !(srs.starts_with("urn:") || srs.contains("/def/crs/")) {
        return false;
    }
    let code = srs.rsplit([':', '/']).next().unwrap_or_default();
    LAT_LON_EPSG_CODES.contains(&code)
}

fn collect_geometries(element: &Element, parent: &SrsContext, out: &mut Vec<Geometry>) -> Result<()> {
    let srs = SrsContext::from_element(element, Some(parent));
    match element.name.as_str() {
        "Point" => {
            let coords = read_coordinates(element, &srs)?;
            let first = coords.into_iter().next().ok_or_else(|| ProxyError::ConversionError {
                message: "Point has no coordinates".to_string(),
            })?;
            out.push(Geometry::Point(first));
        }
        "LineString" | "LineStringSegment" => {
            out.push(Geometry::LineString(read_coordinates(element, &srs)?));
        }
        "Polygon" | "PolygonPatch" => out.push(read_polygon(element, &srs)?),
        "Envelope" => {}
        _ => {
            for child in &element.children {
                collect_geometries(child, &srs, out)?;
            }
        }
    }
    Ok(())
}

fn read_polygon(element: &Element, srs: &SrsContext) -> Result<Geometry> {
    let ring = |boundary: &Element| -> Result<Vec<Coordinate>> {
        let boundary_srs = SrsContext::from_element(boundary, Some(srs));
        match boundary.find("LinearRing") {
            Some(ring) => read_coordinates(ring, &SrsContext::from_element(ring, Some(&boundary_srs))),
            None => Err(ProxyError::ConversionError {
                message: "polygon boundary without LinearRing".to_string(),
            }),
        }
    };

    let exterior = element
        .child("exterior")
        .or_else(|| element.child("outerBoundaryIs"))
        .ok_or_else(|| ProxyError::ConversionError {
            message: "Polygon has no exterior ring".to_string(),
        })?;
    let exterior = ring(exterior)?;

    let mut interiors = Vec::new();
    for boundary in element
        .children_named("interior")
        .chain(element.children_named("innerBoundaryIs"))
    {
        interiors.push(ring(boundary)?);
    }

    Ok(Geometry::Polygon { exterior, interiors })
}

/// Reads `posList`, repeated `pos` or GML2 `coordinates` beneath a geometry.
/// `srsName`/`srsDimension` on the coordinate element itself override the geometry's.
fn read_coordinates(element: &Element, srs: &SrsContext) -> Result<Vec<Coordinate>> {
    if let Some(pos_list) = element.child("posList") {
        let srs = SrsContext::from_element(pos_list, Some(srs));
        let coords = parse_pos_list(pos_list.trimmed_text(), srs.dimension.unwrap_or(2))?;
        return Ok(srs.oriented(coords));
    }
    if let Some(coordinates) = element.child("coordinates") {
        let srs = SrsContext::from_element(coordinates, Some(srs));
        return Ok(srs.oriented(parse_gml2_coordinates(coordinates)?));
    }

    let mut coords = Vec::new();
    for pos in element.children_named("pos") {
        let srs = SrsContext::from_element(pos, Some(srs));
        let values = parse_numbers(pos.trimmed_text())?;
        let dimension = srs.dimension.unwrap_or(values.len().clamp(2, 3));
        coords.extend(srs.oriented(chunk_coordinates(&values, dimension)?));
    }
    Ok(coords)
}

fn parse_ordinate(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_numbers(text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            parse_ordinate(token).ok_or_else(|| ProxyError::ConversionError {
                message: format!("invalid coordinate value '{}'", token),
            })
        })
        .collect()
}

fn parse_pos_list(text: &str, dimension: usize) -> Result<Vec<Coordinate>> {
    chunk_coordinates(&parse_numbers(text)?, dimension)
}

fn chunk_coordinates(values: &[f64], dimension: usize) -> Result<Vec<Coordinate>> {
    if !(2..=3).contains(&dimension) || values.len() % dimension != 0 {
        return Err(ProxyError::ConversionError {
            message: format!(
                "{} coordinate values do not fit dimension {}",
                values.len(),
                dimension
            ),
        });
    }
    Ok(values
        .chunks(dimension)
        .map(|c| Coordinate {
            x: c[0],
            y: c[1],
            z: c.get(2).copied(),
        })
        .collect())
}

fn parse_gml2_coordinates(element: &Element) -> Result<Vec<Coordinate>> {
    let cs = element.attr("cs").unwrap_or(",");
    let ts = element.attr("ts").unwrap_or(" ");

    let tuples: Vec<&str> = if ts.trim().is_empty() {
        element.trimmed_text().split_whitespace().collect()
    } else {
        element
            .trimmed_text()
            .split(ts)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    };

    tuples
        .into_iter()
        .map(|tuple| {
            let values = tuple
                .split(cs)
                .map(|v| {
                    parse_ordinate(v).ok_or_else(|| ProxyError::ConversionError {
                        message: format!("invalid coordinate tuple '{}'", tuple),
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            match values.as_slice() {
                [x, y] => Ok(Coordinate { x: *x, y: *y, z: None }),
                [x, y, z] => Ok(Coordinate { x: *x, y: *y, z: Some(*z) }),
                _ => Err(ProxyError::ConversionError {
                    message: format!("invalid coordinate tuple '{}'", tuple),
                }),
            }
        })
        .collect()
}
