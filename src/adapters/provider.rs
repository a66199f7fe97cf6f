use crate::core::loader::DescriptionFormat;
use crate::domain::ports::ServiceProvider;
use crate::utils::error::{ManagerError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Suffix of the files a provider declares its service apis in.
pub const DEFINITION_SUFFIX: &str = "http_services_api";

/// Reads `<path>/<name>.http_services_api.{yml,yaml,json,toml}`.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    name: String,
    path: PathBuf,
}

impl DirectoryProvider {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// The first definition file that exists for this provider.
    pub fn definition_file(&self) -> Option<PathBuf> {
        DescriptionFormat::ALLOWED_EXTENSIONS
            .iter()
            .map(|ext| {
                self.path
                    .join(format!("{}.{}.{}", self.name, DEFINITION_SUFFIX, ext))
            })
            .find(|candidate| candidate.is_file())
    }
}

impl ServiceProvider for DirectoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_path(&self) -> &Path {
        &self.path
    }

    fn definitions(&self) -> Result<Map<String, Value>> {
        let Some(file) = self.definition_file() else {
            tracing::debug!(
                "Provider '{}' has no {} file in {}",
                self.name,
                DEFINITION_SUFFIX,
                self.path.display()
            );
            return Ok(Map::new());
        };

        let format = DescriptionFormat::from_path(&file)?;
        let content = std::fs::read_to_string(&file)?;
        let value = format.decode(&content).map_err(|e| {
            ManagerError::config(format!("Unable to parse {}: {}", file.display(), e))
        })?;
        into_definitions(&self.name, value)
    }
}

/// Definitions held in memory, for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    path: PathBuf,
    definitions: Map<String, Value>,
}

impl StaticProvider {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        definitions: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            definitions,
        }
    }

    pub fn from_yaml(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        yaml: &str,
    ) -> Result<Self> {
        let name = name.into();
        let value = DescriptionFormat::Yaml.decode(yaml)?;
        let definitions = into_definitions(&name, value)?;
        Ok(Self::new(name, path, definitions))
    }
}

impl ServiceProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_path(&self) -> &Path {
        &self.path
    }

    fn definitions(&self) -> Result<Map<String, Value>> {
        Ok(self.definitions.clone())
    }
}

fn into_definitions(provider: &str, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ManagerError::config(format!(
            "Service api definitions of provider \"{}\" must be a mapping of ids",
            provider
        ))),
    }
}
