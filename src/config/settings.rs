use crate::adapters::provider::DirectoryProvider;
use crate::adapters::request_store::FileRequestStore;
use crate::adapters::storage::LocalStorage;
use crate::core::dispatcher::Dispatcher;
use crate::core::factory::ClientFactory;
use crate::core::registry::ServiceRegistry;
use crate::domain::ports::{OverrideProvider, ServiceProvider};
use crate::utils::error::{ManagerError, Result};
use crate::utils::validation::{validate_machine_name, validate_path, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory provider paths and `saved_requests_path` are relative to this.
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub enable_overriding_service_definitions: bool,
    #[serde(default = "default_saved_requests_path")]
    pub saved_requests_path: String,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Per service api overrides, applied when overriding is enabled.
    #[serde(default)]
    pub http_services_api: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub path: String,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_saved_requests_path() -> String {
    "config/http_config_request".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: default_root(),
            enable_overriding_service_definitions: false,
            saved_requests_path: default_saved_requests_path(),
            providers: Vec::new(),
            http_services_api: Map::new(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file. Relative `root` values resolve
    /// against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(ManagerError::IoError)?;
        let mut settings = Self::from_toml_str(&content)?;

        if Path::new(&settings.root).is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                settings.root = dir.join(&settings.root).to_string_lossy().into_owned();
            }
        }
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ManagerError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ManagerError::config(format!("invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    pub fn saved_requests_dir(&self) -> PathBuf {
        self.root_path().join(&self.saved_requests_path)
    }

    pub fn service_providers(&self) -> Vec<Arc<dyn ServiceProvider>> {
        self.providers
            .iter()
            .map(|p| {
                Arc::new(DirectoryProvider::new(&p.name, self.root_path().join(&p.path)))
                    as Arc<dyn ServiceProvider>
            })
            .collect()
    }

    pub fn registry(&self) -> ServiceRegistry {
        let overrides: Arc<dyn OverrideProvider> = Arc::new(self.clone());
        ServiceRegistry::new(
            self.service_providers(),
            Some(overrides),
            self.enable_overriding_service_definitions,
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::new(ClientFactory::new(Arc::new(self.registry()))))
    }

    pub fn request_store(&self) -> FileRequestStore<LocalStorage> {
        FileRequestStore::new(LocalStorage::new(self.saved_requests_dir()))
    }
}

impl OverrideProvider for Settings {
    fn overrides(&self) -> Map<String, Value> {
        self.http_services_api.clone()
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_path("root", &self.root)?;
        validate_path("saved_requests_path", &self.saved_requests_path)?;

        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            validate_machine_name("providers.name", &provider.name)?;
            validate_path(&format!("providers.{}.path", provider.name), &provider.path)?;
            if !seen.insert(provider.name.as_str()) {
                return Err(ManagerError::InvalidConfigValueError {
                    field: "providers.name".to_string(),
                    value: provider.name.clone(),
                    reason: "Provider declared more than once".to_string(),
                });
            }
        }

        for (id, entry) in &self.http_services_api {
            if !entry.is_object() {
                return Err(ManagerError::InvalidConfigValueError {
                    field: format!("http_services_api.{}", id),
                    value: entry.to_string(),
                    reason: "Override must be a table".to_string(),
                });
            }
        }
        Ok(())
    }
}
