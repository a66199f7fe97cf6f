use crate::domain::model::ServiceDescription;
use crate::domain::ports::{OverrideProvider, ServiceProvider};
use crate::utils::error::{ManagerError, Result};
use crate::utils::merge::{intersect_keys, replace_recursive};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Definition keys that are required and the only ones an override may touch.
pub const OVERRIDABLE_PROPERTIES: &[&str] = &["title", "api_path", "config"];

pub type ServiceMap = BTreeMap<String, ServiceDescription>;

/// Index of every service api contributed by the registered providers.
pub struct ServiceRegistry {
    providers: Vec<Arc<dyn ServiceProvider>>,
    overrides: Option<Arc<dyn OverrideProvider>>,
    allow_overriding: bool,
    services: Mutex<Option<Arc<ServiceMap>>>,
}

impl ServiceRegistry {
    pub fn new(
        providers: Vec<Arc<dyn ServiceProvider>>,
        overrides: Option<Arc<dyn OverrideProvider>>,
        allow_overriding: bool,
    ) -> Self {
        Self {
            providers,
            overrides,
            allow_overriding,
            services: Mutex::new(None),
        }
    }

    /// Builds the registry on first use and returns the cached index afterwards.
    pub fn discover(&self) -> Result<Arc<ServiceMap>> {
        let mut cached = self
            .services
            .lock()
            .map_err(|_| ManagerError::config("service registry lock poisoned"))?;

        if let Some(services) = cached.as_ref() {
            return Ok(Arc::clone(services));
        }

        let services = Arc::new(self.build()?);
        tracing::info!(
            "Discovered {} service api(s) from {} provider(s)",
            services.len(),
            self.providers.len()
        );
        *cached = Some(Arc::clone(&services));
        Ok(services)
    }

    /// Drops the cached index; the next lookup rebuilds it.
    pub fn refresh(&self) {
        if let Ok(mut cached) = self.services.lock() {
            *cached = None;
        }
    }

    pub fn get(&self, id: &str) -> Result<ServiceDescription> {
        self.discover()?
            .get(id)
            .cloned()
            .ok_or_else(|| ManagerError::ServiceNotFound { id: id.to_string() })
    }

    pub fn provider_for(&self, id: &str) -> Result<String> {
        Ok(self.get(id)?.provider)
    }

    pub fn has_services_from(&self, provider: &str) -> Result<bool> {
        Ok(self
            .discover()?
            .values()
            .any(|service| service.provider == provider))
    }

    /// Service api ids in sorted order.
    pub fn services(&self) -> Result<Vec<String>> {
        Ok(self.discover()?.keys().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.discover()?.len())
    }

    fn build(&self) -> Result<ServiceMap> {
        let overrides = match (&self.overrides, self.allow_overriding) {
            (Some(source), true) => source.overrides(),
            _ => Map::new(),
        };

        let mut services = ServiceMap::new();
        for provider in &self.providers {
            let definitions = provider.definitions()?;
            tracing::debug!(
                "Provider '{}' declares {} service api(s)",
                provider.name(),
                definitions.len()
            );

            for (id, definition) in definitions {
                let Value::Object(mut definition) = definition else {
                    return Err(ManagerError::config(format!(
                        "Service api definition \"{}\" in provider \"{}\" must be a mapping",
                        id,
                        provider.name()
                    )));
                };

                if let Some(Value::Object(entry)) = overrides.get(&id) {
                    apply_override(&id, &mut definition, entry);
                }
                validate_definition(&id, &definition)?;

                if let Some(previous) = services.get(&id) {
                    return Err(ManagerError::DuplicateService {
                        id,
                        provider: provider.name().to_string(),
                        previous: previous.provider.clone(),
                    });
                }

                let service = build_service(&id, provider.as_ref(), &definition);
                services.insert(id, service);
            }
        }

        Ok(services)
    }
}

fn apply_override(id: &str, definition: &mut Map<String, Value>, entry: &Map<String, Value>) {
    let allowed = intersect_keys(entry, OVERRIDABLE_PROPERTIES);
    let ignored: Vec<&String> = entry.keys().filter(|k| !allowed.contains_key(*k)).collect();
    if !ignored.is_empty() {
        tracing::warn!(
            "Ignoring non-overridable properties {:?} for service api '{}'",
            ignored,
            id
        );
    }
    if !allowed.is_empty() {
        tracing::info!("Applying settings override to service api '{}'", id);
        replace_recursive(definition, &allowed);
    }
}

fn validate_definition(id: &str, definition: &Map<String, Value>) -> Result<()> {
    for property in OVERRIDABLE_PROPERTIES {
        match definition.get(*property) {
            None | Some(Value::Null) => {
                return Err(ManagerError::MissingDefinitionField {
                    service: id.to_string(),
                    field: property.to_string(),
                })
            }
            Some(_) => {}
        }
    }

    if !definition["config"].is_object() {
        return Err(ManagerError::InvalidConfigValueError {
            field: format!("{}.config", id),
            value: definition["config"].to_string(),
            reason: "config must be a mapping".to_string(),
        });
    }
    Ok(())
}

fn build_service(
    id: &str,
    provider: &dyn ServiceProvider,
    definition: &Map<String, Value>,
) -> ServiceDescription {
    let text = |key: &str| match definition.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let api_path = text("api_path");

    ServiceDescription {
        id: id.to_string(),
        title: text("title"),
        source: provider.base_path().join(&api_path),
        api_path,
        base_url: definition
            .get("base_url")
            .and_then(Value::as_str)
            .map(str::to_string),
        provider: provider.name().to_string(),
        config: definition
            .get("config")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    }
}
