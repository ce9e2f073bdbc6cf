use crate::domain::ports::ServiceCaller;
use crate::utils::error::{ProxyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!("gsml-proxy/", env!("CARGO_PKG_VERSION"));

/// `reqwest` backed caller. The client keeps a connection pool, so one
/// instance is shared by every request.
#[derive(Debug, Clone)]
pub struct HttpServiceCaller {
    client: Client,
}

impl HttpServiceCaller {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn http_client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ServiceCaller for HttpServiceCaller {
    async fn get_method_response_as_string(&self, url: &Url) -> Result<String> {
        tracing::debug!("📡 Making request to: {}", url);
        let response = self.http_client().get(url.clone()).send().await?;

        let status = response.status();
        tracing::debug!("📡 Response status: {}", status);

        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn caller() -> HttpServiceCaller {
        HttpServiceCaller::new(Duration::from_secs(5), DEFAULT_USER_AGENT).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body_as_string() {
        let server = MockServer::start();
        let wfs_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/wfs")
                .query_param("request", "GetFeature")
                .header_exists("user-agent");
            then.status(200)
                .header("Content-Type", "text/xml")
                .body("<wfs:FeatureCollection/>");
        });

        let url = Url::parse(&server.url("/wfs?request=GetFeature")).unwrap();
        let body = caller().get_method_response_as_string(&url).await.unwrap();

        wfs_mock.assert();
        assert_eq!(body, "<wfs:FeatureCollection/>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start();
        let wfs_mock = server.mock(|when, then| {
            when.method(GET).path("/wfs");
            then.status(500).body("internal error");
        });

        let url = Url::parse(&server.url("/wfs")).unwrap();
        let err = caller().get_method_response_as_string(&url).await.unwrap_err();

        wfs_mock.assert();
        assert!(matches!(err, ProxyError::UpstreamStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let url = Url::parse("http://127.0.0.1:9/wfs").unwrap();
        let err = caller().get_method_response_as_string(&url).await.unwrap_err();
        assert!(matches!(err, ProxyError::HttpError(_)));
    }
}
