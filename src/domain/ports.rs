use crate::domain::model::SavedRequest;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn delete_file(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn list_files(&self) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// A source of service api definitions, keyed by service id.
pub trait ServiceProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Directory that `api_path` entries are resolved against.
    fn base_path(&self) -> &Path;
    fn definitions(&self) -> Result<Map<String, Value>>;
}

/// Environment level partial definitions, keyed by service id.
pub trait OverrideProvider: Send + Sync {
    fn overrides(&self) -> Map<String, Value>;
}

#[async_trait]
pub trait SavedRequestStore: Send + Sync {
    /// Returns `Ok(None)` when no request is stored under `id`.
    async fn load(&self, id: &str) -> Result<Option<SavedRequest>>;
    async fn save(&self, request: &SavedRequest) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<SavedRequest>>;
}
