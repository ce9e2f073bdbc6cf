use crate::core::{gml, kml};
use crate::domain::model::StyleSheet;
use crate::domain::ports::GmlConverter;
use crate::utils::error::Result;

/// Native GML (2/3.x, GeoSciML) to KML converter.
#[derive(Debug, Clone, Default)]
pub struct GmlToKml {
    default_style: StyleSheet,
}

impl GmlToKml {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style used when a request arrives without a style sheet.
    pub fn with_default_style(default_style: StyleSheet) -> Self {
        Self { default_style }
    }
}

impl GmlConverter for GmlToKml {
    fn convert(&self, gml: &str, style_sheet: Option<&StyleSheet>, source: &str) -> Result<String> {
        let root = gml::parse_document(gml)?;
        gml::check_exception_report(&root)?;

        let features = gml::extract_features(&root)?;
        tracing::debug!(
            "🔄 Converting {} <{}> features to KML (style sheet: {})",
            features.len(),
            root.name,
            if style_sheet.is_some() { "custom" } else { "default" }
        );

        let style = style_sheet.unwrap_or(&self.default_style);
        Ok(kml::write_document(&features, style, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ProxyError;

    const BOREHOLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs" xmlns:gml="http://www.opengis.net/gml"
    xmlns:gsml="urn:cgi:xmlns:CGI:GeoSciML:2.0">
  <gml:featureMember>
    <gsml:Borehole gml:id="gsml.borehole.WTB5">
      <gml:name codeSpace="http://www.ietf.org/rfc/rfc2616">WTB5 &lt;test&gt;</gml:name>
      <gsml:collarLocation>
        <gsml:BoreholeCollar>
          <gsml:location>
            <gml:Point srsName="urn:ogc:def:crs:EPSG:4326"><gml:pos>-28.4139 121.2856</gml:pos></gml:Point>
          </gsml:location>
        </gsml:BoreholeCollar>
      </gsml:collarLocation>
    </gsml:Borehole>
  </gml:featureMember>
</wfs:FeatureCollection>"#;

    #[test]
    fn test_convert_borehole_collection() {
        let kml = GmlToKml::new()
            .convert(BOREHOLES, None, "http://example.com/wfs")
            .unwrap();

        assert!(kml.contains(r#"<Placemark id="gsml.borehole.WTB5"><name>WTB5 &lt;test&gt;</name>"#));
        assert!(kml.contains("<coordinates>121.2856,-28.4139</coordinates>"));
        assert!(kml.contains("<description>http://example.com/wfs</description>"));
    }

    #[test]
    fn test_convert_uses_default_style_when_absent() {
        let converter = GmlToKml::with_default_style(StyleSheet {
            name: Some("Default boreholes".to_string()),
            ..Default::default()
        });

        let kml = converter.convert(BOREHOLES, None, "").unwrap();
        assert!(kml.contains("<name>Default boreholes</name>"));

        let custom = StyleSheet {
            name: Some("Custom".to_string()),
            ..Default::default()
        };
        let kml = converter.convert(BOREHOLES, Some(&custom), "").unwrap();
        assert!(kml.contains("<name>Custom</name>"));
        assert!(!kml.contains("Default boreholes"));
    }

    #[test]
    fn test_convert_reports_service_exception() {
        let report = r#"<ServiceExceptionReport version="1.2.0">
  <ServiceException code="InvalidFormat">Illegal property name: gsml:foo</ServiceException>
</ServiceExceptionReport>"#;

        let err = GmlToKml::new().convert(report, None, "").unwrap_err();
        assert!(matches!(err, ProxyError::ServiceException { ref message } if message == "Illegal property name: gsml:foo"));
    }

    #[test]
    fn test_convert_rejects_non_xml() {
        let err = GmlToKml::new().convert("<html><body>oops", None, "").unwrap_err();
        assert!(matches!(err, ProxyError::XmlError(_)), "got {:?}", err);
    }

    #[test]
    fn test_convert_rejects_deeply_nested_document() {
        let depth = 20_000;
        let gml = format!(
            "<wfs:FeatureCollection><gml:featureMember><x:F>{}{}</x:F></gml:featureMember></wfs:FeatureCollection>",
            "<a>".repeat(depth),
            "</a>".repeat(depth)
        );

        // 在 tokio worker 大小的堆疊上執行
        let result = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || GmlToKml::new().convert(&gml, None, "").map(|_| ()))
            .unwrap()
            .join()
            .unwrap();
        assert!(matches!(result, Err(ProxyError::ConversionError { .. })));
    }
}
