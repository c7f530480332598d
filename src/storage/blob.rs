use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use http::Method;
use object_store::azure::{MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::ObjectStore;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::{connection_string_value, container_name, file_name, ObjectStorage, StorageError};

/// Validity of a shareable read link handed to the transcription service.
pub const SHAREABLE_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Azure blob storage backed by [`object_store`], one client per container.
pub struct BlobStorage {
    account: String,
    access_key: SecretString,
    containers: Mutex<HashMap<String, Arc<MicrosoftAzure>>>,
}

impl BlobStorage {
    pub fn new(account: String, access_key: SecretString) -> Self {
        Self {
            account,
            access_key,
            containers: Mutex::new(HashMap::new()),
        }
    }

    /// Build from an Azure storage connection string
    /// (`AccountName=...;AccountKey=...`).
    pub fn from_connection_string(connection_string: &str) -> Result<Self, StorageError> {
        let account = connection_string_value(connection_string, "AccountName")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StorageError::Config("connection string has no AccountName".into()))?;
        let key = connection_string_value(connection_string, "AccountKey")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StorageError::Config("connection string has no AccountKey".into()))?;

        Ok(Self::new(account, SecretString::from(key)))
    }

    fn container(&self, name: &str) -> Result<Arc<MicrosoftAzure>, StorageError> {
        let mut containers = self
            .containers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(store) = containers.get(name) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(
            MicrosoftAzureBuilder::new()
                .with_account(&self.account)
                .with_access_key(self.access_key.expose_secret())
                .with_container_name(name)
                .build()?,
        );
        containers.insert(name.to_owned(), Arc::clone(&store));
        Ok(store)
    }
}

#[async_trait]
impl ObjectStorage for BlobStorage {
    async fn shareable_read_link(&self, url: &Url) -> Result<Url, StorageError> {
        let container =
            container_name(url).ok_or_else(|| StorageError::InvalidUrl(url.to_string()))?;
        let name = file_name(url)?;

        let store = self.container(&container)?;
        let signed = store
            .signed_url(Method::GET, &Path::from(name.as_str()), SHAREABLE_LINK_TTL)
            .await?;
        Ok(signed)
    }

    async fn write_text(
        &self,
        content: &str,
        container: &str,
        path: &str,
    ) -> Result<(), StorageError> {
        let store = self.container(container)?;
        store
            .put(&Path::from(path), content.as_bytes().to_vec().into())
            .await?;
        tracing::debug!(container, path, "wrote text blob");
        Ok(())
    }

    async fn move_file(
        &self,
        source_container: &str,
        source_name: &str,
        target_container: &str,
        target_name: &str,
    ) -> Result<(), StorageError> {
        let source = self.container(source_container)?;
        let target = self.container(target_container)?;
        let source_path = Path::from(source_name);
        let target_path = Path::from(target_name);

        let bytes = match source.get(&source_path).await {
            Ok(result) => result.bytes().await?,
            Err(e @ object_store::Error::NotFound { .. }) => {
                if target.head(&target_path).await.is_ok() {
                    // Already moved by an earlier attempt.
                    tracing::debug!(source_container, source_name, "source already moved");
                    return Ok(());
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        target.put(&target_path, bytes.into()).await?;
        source.delete(&source_path).await?;

        tracing::info!(
            from = %format!("{source_container}/{source_name}"),
            to = %format!("{target_container}/{target_name}"),
            "moved blob"
        );
        Ok(())
    }
}
