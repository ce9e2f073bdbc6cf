use crate::domain::model::StyleSheet;
use crate::domain::ports::ResourceLoader;
use crate::utils::error::Result;
use crate::utils::validation::validate_resource_path;
use std::path::PathBuf;

/// Style sheets read from a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalResources {
    base_path: PathBuf,
}

impl LocalResources {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl ResourceLoader for LocalResources {
    async fn load_style_sheet(&self, path: &str) -> Result<Option<StyleSheet>> {
        validate_resource_path("styleSheet", path)?;
        let full_path = self.base_path.join(path);

        match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => {
                tracing::debug!("🎨 Loaded style sheet {}", full_path.display());
                StyleSheet::from_toml_str(&content).map(Some)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("🎨 No style sheet at {}, using defaults", full_path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
