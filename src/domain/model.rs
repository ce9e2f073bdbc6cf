use crate::utils::error::{ProxyError, Result};
use crate::utils::validation::{validate_kml_color, validate_non_empty_string, validate_url, Validate};
use serde::{Deserialize, Serialize};
use url::Url;

/// JSON view model returned to the map client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl FeatureModel {
    pub fn success(kml: String) -> Self {
        Self {
            data: Some(kml),
            success: true,
            msg: None,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            data: None,
            success: false,
            msg: Some(msg.into()),
        }
    }
}

/// Declarative KML rendering profile, loaded from a TOML resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    pub name: Option<String>,
    pub name_property: Option<String>,
    pub description_properties: Option<Vec<String>>,
    pub icon_href: Option<String>,
    pub icon_scale: Option<f64>,
    pub line_color: Option<String>,
    pub line_width: Option<f64>,
    pub poly_color: Option<String>,
}

impl StyleSheet {
    /// 從 TOML 字串解析樣式表
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let style: StyleSheet = toml::from_str(content).map_err(|e| ProxyError::ConfigError {
            message: format!("Invalid style sheet: {}", e),
        })?;
        style.validate()?;
        Ok(style)
    }
}

impl Validate for StyleSheet {
    fn validate(&self) -> Result<()> {
        if let Some(color) = &self.line_color {
            validate_kml_color("line_color", color)?;
        }
        if let Some(color) = &self.poly_color {
            validate_kml_color("poly_color", color)?;
        }
        if let Some(href) = &self.icon_href {
            validate_non_empty_string("icon_href", href)?;
        }
        for (field, value) in [("icon_scale", self.icon_scale), ("line_width", self.line_width)] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ProxyError::InvalidConfigValueError {
                        field: field.to_string(),
                        value: v.to_string(),
                        reason: "Value must be a positive number".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A WFS GetFeature request against a service endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRequest {
    pub service_url: String,
    pub type_name: String,
    pub feature_id: Option<String>,
    pub max_features: Option<u32>,
}

impl FeatureRequest {
    pub fn new(service_url: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            type_name: type_name.into(),
            feature_id: None,
            max_features: None,
        }
    }

    pub fn with_feature_id(mut self, feature_id: impl Into<String>) -> Self {
        self.feature_id = Some(feature_id.into());
        self
    }

    pub fn with_max_features(mut self, max_features: Option<u32>) -> Self {
        self.max_features = max_features;
        self
    }

    /// 組出 GetFeature 的 GET URL，保留服務 URL 原有的查詢參數
    pub fn to_url(&self) -> Result<Url> {
        let mut url = validate_url("serviceUrl", &self.service_url)?;
        if self.type_name.trim().is_empty() {
            return Err(ProxyError::ValidationError {
                message: "Parameter 'typeName' cannot be empty".to_string(),
            });
        }

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("service", "WFS")
                .append_pair("version", "1.1.0")
                .append_pair("request", "GetFeature")
                .append_pair("typeName", self.type_name.trim());
            if let Some(feature_id) = &self.feature_id {
                query.append_pair("featureId", feature_id);
            }
            if let Some(max) = self.max_features {
                query.append_pair("maxFeatures", &max.to_string());
            }
        }

        Ok(url)
    }
}
