use crate::core::gml::{Coordinate, Feature, Geometry};
use crate::domain::model::StyleSheet;
use quick_xml::escape::escape;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
pub const STYLE_ID: &str = "gsml-style";

const DEFAULT_DOCUMENT_NAME: &str = "GML features";
const DEFAULT_ICON_HREF: &str = "http://maps.google.com/mapfiles/kml/paddle/ylw-circle.png";
const DEFAULT_LINE_COLOR: &str = "ff0000ff";
const DEFAULT_LINE_WIDTH: f64 = 2.0;
const DEFAULT_POLY_COLOR: &str = "7f0000ff";

/// Renders parsed features as a KML 2.2 document.
pub fn write_document(features: &[Feature], style: &StyleSheet, source: &str) -> String {
    let mut parts: Vec<String> = vec![
        r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
        format!(r#"<kml xmlns="{}"><Document>"#, KML_NAMESPACE),
        format!(
            "<name>{}</name>",
            escape(style.name.as_deref().unwrap_or(DEFAULT_DOCUMENT_NAME))
        ),
    ];
    if !source.is_empty() {
        parts.push(format!("<description>{}</description>", escape(source)));
    }
    parts.push(style_element(style));
    parts.extend(features.iter().map(|feature| placemark(feature, style)));
    parts.push("</Document></kml>".to_string());

    parts.concat()
}

fn style_element(style: &StyleSheet) -> String {
    format!(
        r#"<Style id="{}"><IconStyle><scale>{}</scale><Icon><href>{}</href></Icon></IconStyle><LineStyle><color>{}</color><width>{}</width></LineStyle><PolyStyle><color>{}</color></PolyStyle></Style>"#,
        STYLE_ID,
        style.icon_scale.unwrap_or(1.0),
        escape(style.icon_href.as_deref().unwrap_or(DEFAULT_ICON_HREF)),
        style.line_color.as_deref().unwrap_or(DEFAULT_LINE_COLOR),
        style.line_width.unwrap_or(DEFAULT_LINE_WIDTH),
        style.poly_color.as_deref().unwrap_or(DEFAULT_POLY_COLOR)
    )
}

fn placemark_name<'a>(feature: &'a Feature, style: &StyleSheet) -> &'a str {
    style
        .name_property
        .as_deref()
        .and_then(|p| feature.property(p))
        .or_else(|| feature.property("name"))
        .unwrap_or(&feature.id)
}

fn placemark_description(feature: &Feature, style: &StyleSheet) -> String {
    let lines: Vec<String> = match &style.description_properties {
        Some(keys) => keys
            .iter()
            .filter_map(|key| feature.property(key).map(|value| format!("{}: {}", key, value)))
            .collect(),
        None => feature
            .properties
            .iter()
            .map(|(key, value)| format!("{}: {}", key, value))
            .collect(),
    };
    lines.join("\n")
}

fn placemark(feature: &Feature, style: &StyleSheet) -> String {
    let mut parts = vec![
        format!(r#"<Placemark id="{}">"#, escape(&feature.id)),
        format!("<name>{}</name>", escape(placemark_name(feature, style))),
    ];

    let description = placemark_description(feature, style);
    if !description.is_empty() {
        parts.push(format!("<description>{}</description>", escape(&description)));
    }
    parts.push(format!("<styleUrl>#{}</styleUrl>", STYLE_ID));

    parts.push("<ExtendedData>".to_string());
    parts.push(format!(
        r#"<Data name="featureType"><value>{}</value></Data>"#,
        escape(&feature.type_name)
    ));
    parts.extend(feature.properties.iter().map(|(key, value)| {
        format!(
            r#"<Data name="{}"><value>{}</value></Data>"#,
            escape(key),
            escape(value)
        )
    }));
    parts.push("</ExtendedData>".to_string());

    match feature.geometries.as_slice() {
        [] => {}
        [single] => parts.push(geometry_element(single)),
        many => {
            parts.push("<MultiGeometry>".to_string());
            parts.extend(many.iter().map(geometry_element));
            parts.push("</MultiGeometry>".to_string());
        }
    }

    parts.push("</Placemark>".to_string());
    parts.concat()
}

fn geometry_element(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(c) => {
            format!("<Point><coordinates>{}</coordinates></Point>", format_coords(&[*c]))
        }
        Geometry::LineString(coords) => format!(
            "<LineString><tessellate>1</tessellate><coordinates>{}</coordinates></LineString>",
            format_coords(coords)
        ),
        Geometry::Polygon { exterior, interiors } => {
            let inner: String = interiors
                .iter()
                .map(|ring| {
                    format!(
                        "<innerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></innerBoundaryIs>",
                        format_coords(ring)
                    )
                })
                .collect();
            format!(
                "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs>{}</Polygon>",
                format_coords(exterior),
                inner
            )
        }
    }
}

/// KML wants `lon,lat[,alt]` tuples separated by spaces.
fn format_coords(coords: &[Coordinate]) -> String {
    coords
        .iter()
        .map(|c| match c.z {
            Some(z) => format!("{},{},{}", c.x, c.y, z),
            None => format!("{},{}", c.x, c.y),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
