pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use adapters::{HttpServiceCaller, LocalResources};
pub use config::ProxyConfig;
pub use crate::core::{controller::GsmlController, gml_to_kml::GmlToKml};
pub use domain::model::{FeatureModel, FeatureRequest, StyleSheet};
pub use utils::error::{ProxyError, Result};
