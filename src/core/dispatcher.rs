use crate::core::coercion::coerce_inputs;
use crate::core::client::ServiceClient;
use crate::core::factory::ClientFactory;
use crate::domain::model::{CommandResult, SavedRequest};
use crate::domain::ports::SavedRequestStore;
use crate::utils::error::{ManagerError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point for executing named operations of any registered service api.
#[derive(Clone)]
pub struct Dispatcher {
    factory: Arc<ClientFactory>,
}

impl Dispatcher {
    pub fn new(factory: Arc<ClientFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<ClientFactory> {
        &self.factory
    }

    pub async fn execute(
        &self,
        service_id: &str,
        operation: &str,
        params: Map<String, Value>,
    ) -> Result<CommandResult> {
        let client = self.client(service_id).await?;
        client.call(operation, params).await
    }

    /// Like [`Dispatcher::execute`], with every value given as operator text
    /// and coerced by the declared parameter types first.
    pub async fn execute_raw(
        &self,
        service_id: &str,
        operation: &str,
        raw: &BTreeMap<String, String>,
    ) -> Result<CommandResult> {
        let client = self.client(service_id).await?;
        let params = coerce_inputs(client.operation(operation)?, raw)?;
        client.call(operation, params).await
    }

    pub async fn execute_saved(&self, request: &SavedRequest) -> Result<CommandResult> {
        tracing::debug!(
            "Replaying saved request '{}' ({}.{})",
            request.id,
            request.service_api,
            request.command_name
        );
        let client = self.client(&request.service_api).await?;
        let operation = client.operation(&request.command_name)?;
        let params = request.typed_parameters(operation)?;
        client.call(&request.command_name, params).await
    }

    /// Resolves a client off the async executor; first use reads description
    /// files and runs hooks, both of which may block.
    async fn client(&self, service_id: &str) -> Result<Arc<ServiceClient>> {
        let factory = Arc::clone(&self.factory);
        let service_id = service_id.to_string();
        tokio::task::spawn_blocking(move || factory.get_client(&service_id))
            .await
            .map_err(|e| ManagerError::config(format!("Client construction task failed: {}", e)))?
    }

    /// Loads `id` from `store` and executes it.
    pub async fn execute_stored(
        &self,
        store: &dyn SavedRequestStore,
        id: &str,
    ) -> Result<CommandResult> {
        let request = store
            .load(id)
            .await?
            .ok_or_else(|| ManagerError::SavedRequestNotFound { id: id.to_string() })?;
        self.execute_saved(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::StaticProvider;
    use crate::core::registry::ServiceRegistry;
    use crate::domain::ports::ServiceProvider;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn dispatcher(base_url: &str) -> (TempDir, Dispatcher) {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("jsonplaceholder.yml"),
            r#"
operations:
  CreatePost:
    httpMethod: POST
    uri: /posts
    parameters:
      title: {type: string, required: true}
      userId: {type: integer}
      tags: {type: array, items: {type: string}}
"#,
        )
        .unwrap();

        let yaml = format!(
            "jsonplaceholder:\n  title: JSON Placeholder\n  api_path: jsonplaceholder.yml\n  config:\n    base_uri: \"{}\"\n",
            base_url
        );
        let provider: Arc<dyn ServiceProvider> =
            Arc::new(StaticProvider::from_yaml("example", dir.path(), &yaml).unwrap());
        let registry = Arc::new(ServiceRegistry::new(vec![provider], None, false));
        let factory = Arc::new(ClientFactory::new(registry));
        (dir, Dispatcher::new(factory))
    }

    #[tokio::test]
    async fn test_execute_without_required_parameter() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/posts");
            then.status(201);
        });
        let (_dir, dispatcher) = dispatcher(&server.base_url());

        let err = dispatcher
            .execute("jsonplaceholder", "CreatePost", Map::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("title"));
        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_execute_raw_coerces_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/posts")
                .json_body(json!({"title": "Hi", "userId": 3, "tags": ["a", "b"]}));
            then.status(201).json_body(json!({"id": 101}));
        });
        let (_dir, dispatcher) = dispatcher(&server.base_url());

        let mut raw = BTreeMap::new();
        raw.insert("title".to_string(), "Hi".to_string());
        raw.insert("userId".to_string(), "3".to_string());
        raw.insert("tags".to_string(), "a\n\nb\n".to_string());

        let result = dispatcher
            .execute_raw("jsonplaceholder", "CreatePost", &raw)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(result.get("id"), Some(&json!(101)));
    }

    #[tokio::test]
    async fn test_client_is_built_off_the_executor_thread() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/posts");
            then.status(201);
        });
        let (_dir, dispatcher) = dispatcher(&server.base_url());

        let executor = std::thread::current().id();
        let hook_thread = Arc::new(std::sync::Mutex::new(None));
        let seen = Arc::clone(&hook_thread);
        dispatcher.factory().subscribe(
            move |_: &str, _: &mut crate::core::transport::TransportPipeline| -> Result<()> {
                *seen.lock().unwrap() = Some(std::thread::current().id());
                Ok(())
            },
        );

        let mut params = Map::new();
        params.insert("title".to_string(), json!("Hi"));
        dispatcher.execute("jsonplaceholder", "CreatePost", params).await.unwrap();

        let built_on = hook_thread.lock().unwrap().expect("hook ran");
        assert_ne!(built_on, executor);
    }

    #[tokio::test]
    async fn test_execute_unknown_service() {
        let (_dir, dispatcher) = dispatcher("http://127.0.0.1:9");
        let err = dispatcher
            .execute("nope", "CreatePost", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::ServiceNotFound { .. }));
    }
}
