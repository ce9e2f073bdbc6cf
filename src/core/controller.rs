use crate::core::{FeatureModel, FeatureRequest, GmlConverter, Result, ServiceCaller, StyleSheet};
use crate::utils::validation::validate_url;
use std::io::Write;

/// Fetches GML from a feature service and hands it back as KML.
///
/// Both collaborators are injected, so tests can swap in doubles for the
/// HTTP call and the conversion.
pub struct GsmlController<H: ServiceCaller, C: GmlConverter> {
    service_caller: H,
    gml_to_kml: C,
    max_features: Option<u32>,
}

impl<H: ServiceCaller, C: GmlConverter> GsmlController<H, C> {
    pub fn new(service_caller: H, gml_to_kml: C) -> Self {
        Self {
            service_caller,
            gml_to_kml,
            max_features: None,
        }
    }

    /// Caps the number of features asked for in GetFeature requests.
    pub fn with_max_features(mut self, max_features: Option<u32>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Requests every feature of `feature_type` and wraps the KML in a view model.
    pub async fn request_all_features(
        &self,
        service_url: &str,
        feature_type: &str,
        style_sheet: Option<&StyleSheet>,
    ) -> FeatureModel {
        let request =
            FeatureRequest::new(service_url, feature_type).with_max_features(self.max_features);
        self.feature_model(&request, style_sheet).await
    }

    /// Requests a single feature by id.
    pub async fn request_feature(
        &self,
        service_url: &str,
        feature_type: &str,
        feature_id: &str,
        style_sheet: Option<&StyleSheet>,
    ) -> FeatureModel {
        let request = FeatureRequest::new(service_url, feature_type).with_feature_id(feature_id);
        self.feature_model(&request, style_sheet).await
    }

    /// Fetches `service_url` as-is and writes the converted KML straight to `writer`.
    ///
    /// Nothing is written when the fetch or the conversion fails.
    pub async fn xslt_rest_proxy<W: Write + Send>(
        &self,
        service_url: &str,
        style_sheet: Option<&StyleSheet>,
        writer: &mut W,
    ) -> Result<()> {
        let url = validate_url("serviceUrl", service_url)?;
        tracing::info!("📡 Proxying {} through KML conversion", url);

        let gml = self.service_caller.get_method_response_as_string(&url).await?;
        let kml = self.gml_to_kml.convert(&gml, style_sheet, url.as_str())?;

        writer.write_all(kml.as_bytes())?;
        writer.flush()?;
        tracing::debug!("💾 Wrote {} bytes of KML", kml.len());
        Ok(())
    }

    async fn feature_model(
        &self,
        request: &FeatureRequest,
        style_sheet: Option<&StyleSheet>,
    ) -> FeatureModel {
        match self.fetch_features(request, style_sheet).await {
            Ok(kml) => FeatureModel::success(kml),
            Err(e) => {
                tracing::error!(
                    "❌ GetFeature for {} at {} failed: {} (Category: {:?})",
                    request.type_name,
                    request.service_url,
                    e,
                    e.category()
                );
                FeatureModel::failure(e.user_friendly_message())
            }
        }
    }

    async fn fetch_features(
        &self,
        request: &FeatureRequest,
        style_sheet: Option<&StyleSheet>,
    ) -> Result<String> {
        let url = request.to_url()?;
        tracing::info!("📡 GetFeature {} from {}", request.type_name, request.service_url);

        let gml = self.service_caller.get_method_response_as_string(&url).await?;
        tracing::debug!("📥 Received {} bytes of GML", gml.len());

        self.gml_to_kml
            .convert(&gml, style_sheet, &request.service_url)
    }
}
