use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Upstream service returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Upstream service exception: {message}")]
    ServiceException { message: String },

    #[error("XML parsing error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttrError(#[from] quick_xml::events::attributes::AttrError),

    #[error("GML conversion error: {message}")]
    ConversionError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Upstream,
    Conversion,
    Configuration,
    Validation,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ProxyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProxyError::HttpError(_) => ErrorCategory::Network,
            ProxyError::UpstreamStatus { .. } | ProxyError::ServiceException { .. } => {
                ErrorCategory::Upstream
            }
            ProxyError::XmlError(_)
            | ProxyError::XmlAttrError(_)
            | ProxyError::ConversionError { .. } => ErrorCategory::Conversion,
            ProxyError::ConfigError { .. }
            | ProxyError::ConfigValidationError { .. }
            | ProxyError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            ProxyError::ValidationError { .. } | ProxyError::UrlError(_) => {
                ErrorCategory::Validation
            }
            ProxyError::IoError(_) | ProxyError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Upstream => ErrorSeverity::Medium,
            ErrorCategory::Conversion | ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 是否為呼叫端輸入造成的錯誤 (HTTP 400)；伺服器端設定錯誤不算
    pub fn is_client_error(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the WFS endpoint is reachable and retry",
            ErrorCategory::Upstream => {
                "Check the serviceUrl and typeName against the service's GetCapabilities"
            }
            ErrorCategory::Conversion => "The upstream response is not valid GML",
            ErrorCategory::Configuration => "Fix the configuration file and restart",
            ErrorCategory::Validation => "Check the request parameters",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ProxyError::HttpError(e) if e.is_timeout() => {
                "The feature service did not respond in time".to_string()
            }
            ProxyError::HttpError(_) => "Could not reach the feature service".to_string(),
            ProxyError::UpstreamStatus { status, .. } => {
                format!("The feature service responded with HTTP {}", status)
            }
            ProxyError::ServiceException { message } => {
                format!("The feature service reported an error: {}", message)
            }
            ProxyError::ValidationError { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
