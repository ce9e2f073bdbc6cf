use crate::domain::model::StyleSheet;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Performs an HTTP GET against a remote service and hands back the body.
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    async fn get_method_response_as_string(&self, url: &Url) -> Result<String>;
}

/// Turns a GML document into KML.
///
/// `source` identifies where the GML came from and ends up in the KML
/// document description.
pub trait GmlConverter: Send + Sync {
    fn convert(&self, gml: &str, style_sheet: Option<&StyleSheet>, source: &str) -> Result<String>;
}

pub trait ResourceLoader: Send + Sync {
    /// Resolves a style sheet by relative path. A missing resource is `Ok(None)`.
    fn load_style_sheet(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<StyleSheet>>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn bind_addr(&self) -> &str;
    fn resource_dir(&self) -> &str;
    fn default_style_sheet(&self) -> &str;
    fn request_timeout(&self) -> Duration;
    fn user_agent(&self) -> &str;
    fn max_features(&self) -> Option<u32>;
}
