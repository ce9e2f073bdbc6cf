use crate::adapters::http::DEFAULT_USER_AGENT;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{ProxyError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_resource_path, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const LOG_FORMATS: &[&str] = &["compact", "json"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub resources: ResourcesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub max_features: Option<u32>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    pub directory: String,
    pub default_style_sheet: String,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            directory: "./resources".to_string(),
            default_style_sheet: "kml.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
        }
    }
}

impl ProxyConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ProxyError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ProxyError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${WFS_TIMEOUT})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ProxyError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| ProxyError::InvalidConfigValueError {
                field: "server.bind_addr".to_string(),
                value: self.server.bind_addr.clone(),
                reason: e.to_string(),
            })?;

        validate_positive_number("upstream.timeout_seconds", self.upstream.timeout_seconds, 1)?;
        validate_non_empty_string("upstream.user_agent", &self.upstream.user_agent)?;
        if let Some(max) = self.upstream.max_features {
            validate_range("upstream.max_features", max, 1, 100_000)?;
        }

        validate_path("resources.directory", &self.resources.directory)?;
        validate_resource_path(
            "resources.default_style_sheet",
            &self.resources.default_style_sheet,
        )?;

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ProxyError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: self.logging.format.clone(),
                reason: format!("Supported formats: {}", LOG_FORMATS.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ProxyConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

impl ConfigProvider for ProxyConfig {
    fn bind_addr(&self) -> &str {
        &self.server.bind_addr
    }

    fn resource_dir(&self) -> &str {
        &self.resources.directory
    }

    fn default_style_sheet(&self) -> &str {
        &self.resources.default_style_sheet
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_seconds)
    }

    fn user_agent(&self) -> &str {
        &self.upstream.user_agent
    }

    fn max_features(&self) -> Option<u32> {
        self.upstream.max_features
    }
}
