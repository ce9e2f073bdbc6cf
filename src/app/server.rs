use crate::core::controller::GsmlController;
use crate::core::{FeatureModel, GmlConverter, ResourceLoader, ServiceCaller, StyleSheet};
use crate::utils::error::{ErrorCategory, ProxyError, Result};
use crate::utils::validation::validate_required_field;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub const KML_CONTENT_TYPE: &str = "application/vnd.google-earth.kml+xml";

pub struct AppState<H: ServiceCaller, C: GmlConverter, R: ResourceLoader> {
    pub controller: GsmlController<H, C>,
    pub resources: R,
    pub default_style_sheet: String,
}

impl<H: ServiceCaller, C: GmlConverter, R: ResourceLoader> AppState<H, C, R> {
    pub fn new(controller: GsmlController<H, C>, resources: R, default_style_sheet: String) -> Self {
        Self {
            controller,
            resources,
            default_style_sheet,
        }
    }

    /// Resolves the requested style sheet, falling back to the configured default.
    async fn resolve_style_sheet(&self, requested: Option<&str>) -> Result<Option<StyleSheet>> {
        let path = requested
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_style_sheet);
        self.resources.load_style_sheet(path).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeaturesQuery {
    service_url: Option<String>,
    type_name: Option<String>,
    feature_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyQuery {
    service_url: Option<String>,
    style_sheet: Option<String>,
}

pub fn build_router<H, C, R>(state: Arc<AppState<H, C, R>>) -> Router
where
    H: ServiceCaller + 'static,
    C: GmlConverter + 'static,
    R: ResourceLoader + 'static,
{
    Router::new()
        .route("/healthz", get(healthz))
        .route("/getAllFeatures.do", get(get_all_features::<H, C, R>))
        .route("/getFeature.do", get(get_feature::<H, C, R>))
        .route("/xsltRestProxy.do", get(xslt_rest_proxy::<H, C, R>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<H, C, R>(state: Arc<AppState<H, C, R>>, bind_addr: &str) -> Result<()>
where
    H: ServiceCaller + 'static,
    C: GmlConverter + 'static,
    R: ResourceLoader + 'static,
{
    let addr = bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| ProxyError::InvalidConfigValueError {
            field: "server.bind_addr".to_string(),
            value: bind_addr.to_string(),
            reason: e.to_string(),
        })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "🚀 gsml-proxy listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn get_all_features<H, C, R>(
    State(state): State<Arc<AppState<H, C, R>>>,
    Query(q): Query<FeaturesQuery>,
) -> Json<FeatureModel>
where
    H: ServiceCaller + 'static,
    C: GmlConverter + 'static,
    R: ResourceLoader + 'static,
{
    let (service_url, type_name) = match required_pair(&q) {
        Ok(pair) => pair,
        Err(e) => return Json(FeatureModel::failure(e.user_friendly_message())),
    };
    let style_sheet = match state.resolve_style_sheet(None).await {
        Ok(style) => style,
        Err(e) => return Json(style_sheet_failure(e)),
    };

    Json(
        state
            .controller
            .request_all_features(service_url, type_name, style_sheet.as_ref())
            .await,
    )
}

async fn get_feature<H, C, R>(
    State(state): State<Arc<AppState<H, C, R>>>,
    Query(q): Query<FeaturesQuery>,
) -> Json<FeatureModel>
where
    H: ServiceCaller + 'static,
    C: GmlConverter + 'static,
    R: ResourceLoader + 'static,
{
    let (service_url, type_name) = match required_pair(&q) {
        Ok(pair) => pair,
        Err(e) => return Json(FeatureModel::failure(e.user_friendly_message())),
    };
    let feature_id = match validate_required_field("featureId", &q.feature_id) {
        Ok(id) => id,
        Err(e) => return Json(FeatureModel::failure(e.user_friendly_message())),
    };
    let style_sheet = match state.resolve_style_sheet(None).await {
        Ok(style) => style,
        Err(e) => return Json(style_sheet_failure(e)),
    };

    Json(
        state
            .controller
            .request_feature(service_url, type_name, feature_id, style_sheet.as_ref())
            .await,
    )
}

async fn xslt_rest_proxy<H, C, R>(
    State(state): State<Arc<AppState<H, C, R>>>,
    Query(q): Query<ProxyQuery>,
) -> std::result::Result<impl IntoResponse, (StatusCode, String)>
where
    H: ServiceCaller + 'static,
    C: GmlConverter + 'static,
    R: ResourceLoader + 'static,
{
    let service_url = validate_required_field("serviceUrl", &q.service_url).map_err(error_response)?;
    let style_sheet = state
        .resolve_style_sheet(q.style_sheet.as_deref())
        .await
        .map_err(error_response)?;

    let mut body: Vec<u8> = Vec::new();
    state
        .controller
        .xslt_rest_proxy(service_url, style_sheet.as_ref(), &mut body)
        .await
        .map_err(error_response)?;

    Ok(([(header::CONTENT_TYPE, KML_CONTENT_TYPE)], body))
}

fn required_pair(q: &FeaturesQuery) -> Result<(&str, &str)> {
    let service_url = validate_required_field("serviceUrl", &q.service_url)?;
    let type_name = validate_required_field("typeName", &q.type_name)?;
    Ok((service_url.as_str(), type_name.as_str()))
}

fn style_sheet_failure(e: ProxyError) -> FeatureModel {
    warn!("🎨 Style sheet could not be loaded: {}", e);
    FeatureModel::failure(e.user_friendly_message())
}

fn error_response(e: ProxyError) -> (StatusCode, String) {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        match e.category() {
            ErrorCategory::Network | ErrorCategory::Upstream | ErrorCategory::Conversion => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };
    error!(
        "❌ Proxy request failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    (status, e.user_friendly_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body, body::Body, http::Request};
    use std::sync::Mutex;
    use tower::ServiceExt;
    use url::Url;

    #[derive(Default)]
    struct StubCaller {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ServiceCaller for StubCaller {
        async fn get_method_response_as_string(&self, url: &Url) -> Result<String> {
            self.urls.lock().unwrap().push(url.to_string());
            if url.path() == "/broken" {
                return Err(ProxyError::UpstreamStatus {
                    status: 500,
                    url: url.to_string(),
                });
            }
            Ok("<wfs:FeatureCollection/>".to_string())
        }
    }

    struct StubConverter;

    impl GmlConverter for StubConverter {
        fn convert(&self, _gml: &str, style_sheet: Option<&StyleSheet>, _source: &str) -> Result<String> {
            match style_sheet.and_then(|s| s.name.as_deref()) {
                Some(name) => Ok(format!("kmlBlob:{}", name)),
                None => Ok("kmlBlob".to_string()),
            }
        }
    }

    /// 只認得 `styled.toml`，其餘一律視為不存在
    struct StubResources;

    impl ResourceLoader for StubResources {
        async fn load_style_sheet(&self, path: &str) -> Result<Option<StyleSheet>> {
            match path {
                "styled.toml" => Ok(Some(StyleSheet {
                    name: Some("styled".to_string()),
                    ..Default::default()
                })),
                "../escape.toml" => Err(ProxyError::ValidationError {
                    message: "escapes resource directory".to_string(),
                }),
                "corrupt.toml" => Err(ProxyError::ConfigError {
                    message: "Invalid style sheet: invalid type: integer `12`".to_string(),
                }),
                _ => Ok(None),
            }
        }
    }

    fn test_app() -> Router {
        let controller = GsmlController::new(StubCaller::default(), StubConverter);
        build_router(Arc::new(AppState::new(
            controller,
            StubResources,
            "kml.toml".to_string(),
        )))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, content_type, body.to_vec())
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (status, _, body) = get(test_app(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn get_all_features_returns_json_model() {
        let (status, _, body) = get(
            test_app(),
            "/getAllFeatures.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs&typeName=gsml%3ABorehole",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let model: FeatureModel = serde_json::from_slice(&body).expect("json");
        assert_eq!(model, FeatureModel::success("kmlBlob".to_string()));
    }

    #[tokio::test]
    async fn get_all_features_missing_type_name_is_failure_model() {
        let (status, _, body) =
            get(test_app(), "/getAllFeatures.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs").await;

        assert_eq!(status, StatusCode::OK);
        let model: FeatureModel = serde_json::from_slice(&body).expect("json");
        assert!(!model.success);
        assert_eq!(model.msg.as_deref(), Some("Missing required parameter 'typeName'"));
    }

    #[tokio::test]
    async fn get_feature_requires_feature_id() {
        let (_, _, body) = get(
            test_app(),
            "/getFeature.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs&typeName=gsml%3ABorehole",
        )
        .await;
        let model: FeatureModel = serde_json::from_slice(&body).expect("json");
        assert!(!model.success);

        let (_, _, body) = get(
            test_app(),
            "/getFeature.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs&typeName=gsml%3ABorehole&featureId=b.1",
        )
        .await;
        let model: FeatureModel = serde_json::from_slice(&body).expect("json");
        assert_eq!(model.data.as_deref(), Some("kmlBlob"));
    }

    #[tokio::test]
    async fn xslt_rest_proxy_streams_kml() {
        let (status, content_type, body) = get(
            test_app(),
            "/xsltRestProxy.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs%3Frequest%3DGetFeature",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(KML_CONTENT_TYPE));
        assert_eq!(body, b"kmlBlob");
    }

    #[tokio::test]
    async fn xslt_rest_proxy_uses_requested_style_sheet() {
        let (_, _, body) = get(
            test_app(),
            "/xsltRestProxy.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs&styleSheet=styled.toml",
        )
        .await;
        assert_eq!(body, b"kmlBlob:styled");
    }

    #[tokio::test]
    async fn xslt_rest_proxy_error_statuses() {
        let (status, _, _) = get(test_app(), "/xsltRestProxy.do").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get(
            test_app(),
            "/xsltRestProxy.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs&styleSheet=..%2Fescape.toml",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = get(
            test_app(),
            "/xsltRestProxy.do?serviceUrl=http%3A%2F%2Ffake.org%2Fbroken",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, b"The feature service responded with HTTP 500");
    }

    #[tokio::test]
    async fn xslt_rest_proxy_corrupt_style_sheet_is_server_error() {
        let (status, _, _) = get(
            test_app(),
            "/xsltRestProxy.do?serviceUrl=http%3A%2F%2Ffake.org%2Fwfs&styleSheet=corrupt.toml",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn xslt_rest_proxy_bad_service_url_is_client_error() {
        let (status, _, body) = get(test_app(), "/xsltRestProxy.do?serviceUrl=fake").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().starts_with("Invalid URL"));
    }

    #[tokio::test]
    async fn serve_rejects_bad_bind_addr() {
        let controller = GsmlController::new(StubCaller::default(), StubConverter);
        let state = Arc::new(AppState::new(controller, StubResources, "kml.toml".to_string()));

        let err = serve(state, "not-an-address").await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidConfigValueError { ref field, .. } if field == "server.bind_addr"));
    }
}
