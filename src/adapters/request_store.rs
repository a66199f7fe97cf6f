use crate::domain::model::SavedRequest;
use crate::domain::ports::{SavedRequestStore, Storage};
use crate::utils::error::{ManagerError, Result};
use crate::utils::validation::{validate_machine_name, Validate};
use async_trait::async_trait;
use std::io::ErrorKind;

const FILE_PREFIX: &str = "http_config_request.";
const FILE_SUFFIX: &str = ".yml";

/// Saved requests kept as one YAML document per request.
#[derive(Debug, Clone)]
pub struct FileRequestStore<S: Storage> {
    storage: S,
}

impl<S: Storage> FileRequestStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn file_name(id: &str) -> String {
        format!("{}{}{}", FILE_PREFIX, id, FILE_SUFFIX)
    }
}

#[async_trait]
impl<S: Storage> SavedRequestStore for FileRequestStore<S> {
    async fn load(&self, id: &str) -> Result<Option<SavedRequest>> {
        // ids outside the machine-name alphabet can never have been saved
        if validate_machine_name("id", id).is_err() {
            return Ok(None);
        }

        let data = match self.storage.read_file(&Self::file_name(id)).await {
            Ok(data) => data,
            Err(ManagerError::IoError(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No saved request stored under '{}'", id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let request: SavedRequest = serde_yaml::from_slice(&data)?;
        Ok(Some(request))
    }

    async fn save(&self, request: &SavedRequest) -> Result<()> {
        request.validate()?;
        let mut stored = request.clone();
        stored.updated_at = Some(chrono::Utc::now());

        let yaml = serde_yaml::to_string(&stored)?;
        self.storage
            .write_file(&Self::file_name(&request.id), yaml.as_bytes())
            .await?;
        tracing::info!("Saved request '{}' ({})", request.id, request.label);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        if validate_machine_name("id", id).is_err() {
            return Ok(false);
        }
        self.storage.delete_file(&Self::file_name(id)).await
    }

    async fn list(&self) -> Result<Vec<SavedRequest>> {
        let mut requests = Vec::new();
        for file in self.storage.list_files().await? {
            let Some(id) = file
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            if let Some(request) = self.load(id).await? {
                requests.push(request);
            }
        }
        Ok(requests)
    }
}
