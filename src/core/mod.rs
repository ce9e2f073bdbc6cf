pub mod controller;
pub mod gml;
pub mod gml_to_kml;
pub mod kml;

pub use crate::domain::model::{FeatureModel, FeatureRequest, StyleSheet};
pub use crate::domain::ports::{ConfigProvider, GmlConverter, ResourceLoader, ServiceCaller};
pub use crate::utils::error::Result;
