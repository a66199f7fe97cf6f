use crate::core::client::ServiceClient;
use crate::core::loader::load_description;
use crate::core::registry::ServiceRegistry;
use crate::core::transport::{ClientHook, TransportConfig, TransportPipeline};
use crate::domain::model::Operation;
use crate::utils::error::{ManagerError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

type ClientSlot = Arc<Mutex<Option<Arc<ServiceClient>>>>;

/// Builds and caches one [`ServiceClient`] per service api id.
pub struct ClientFactory {
    registry: Arc<ServiceRegistry>,
    hooks: RwLock<Vec<Arc<dyn ClientHook>>>,
    clients: Mutex<HashMap<String, ClientSlot>>,
}

impl ClientFactory {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            hooks: RwLock::new(Vec::new()),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Registers a hook that sees every client built from now on.
    pub fn subscribe(&self, hook: impl ClientHook + 'static) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.push(Arc::new(hook));
        }
    }

    /// Returns the cached client for `service_id`, building it on first use.
    ///
    /// Each id has its own slot: concurrent callers for the same id wait for
    /// a single construction, while other ids (including ones fetched from
    /// a hook) proceed independently.
    pub fn get_client(&self, service_id: &str) -> Result<Arc<ServiceClient>> {
        let slot = {
            let mut clients = self
                .clients
                .lock()
                .map_err(|_| ManagerError::config("client cache lock poisoned"))?;
            Arc::clone(clients.entry(service_id.to_string()).or_default())
        };

        let mut client = slot
            .lock()
            .map_err(|_| ManagerError::config("client slot lock poisoned"))?;
        if let Some(client) = client.as_ref() {
            return Ok(Arc::clone(client));
        }

        let built = Arc::new(self.build_client(service_id)?);
        *client = Some(Arc::clone(&built));
        Ok(built)
    }

    pub fn get_operations(&self, service_id: &str) -> Result<BTreeMap<String, Operation>> {
        Ok(self.get_client(service_id)?.operations().clone())
    }

    pub fn get_operation(&self, service_id: &str, name: &str) -> Result<Operation> {
        self.get_client(service_id)?.operation(name).cloned()
    }

    /// Number of clients built so far.
    pub fn cached_clients(&self) -> usize {
        let Ok(clients) = self.clients.lock() else {
            return 0;
        };
        // slots still under construction are not counted
        clients
            .values()
            .filter(|slot| matches!(slot.try_lock().as_deref(), Ok(Some(_))))
            .count()
    }

    fn build_client(&self, service_id: &str) -> Result<ServiceClient> {
        let service = self.registry.get(service_id)?;
        let description = load_description(&service.source)?;

        let transport = TransportConfig::from_service(&service, description.base_url.as_deref())?;
        let mut pipeline = TransportPipeline::from_config(&transport)?;

        let hooks = self
            .hooks
            .read()
            .map_err(|_| ManagerError::config("client hook lock poisoned"))?
            .clone();
        for hook in &hooks {
            hook.on_client_build(service_id, &mut pipeline)?;
        }
        tracing::debug!(
            "Notified {} client hook(s) for service api '{}'",
            hooks.len(),
            service_id
        );

        let client = ServiceClient::new(service, description, transport, pipeline)?;
        tracing::info!(
            "Built HTTP client for '{}' ({} operations, base url {})",
            service_id,
            client.operations().len(),
            client.base_url()
        );
        Ok(client)
    }
}
