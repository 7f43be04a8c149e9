//! Document binary storage over `object_store`.

use std::sync::Arc;

use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Error as ObjectStoreError, ObjectStoreExt, PutPayload};
use tracing::{error, info};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{PlatformError, Result};

#[derive(Clone)]
pub struct DocumentStorage {
    store: Arc<dyn object_store::ObjectStore>,
    public_base_url: String,
}

impl DocumentStorage {
    pub fn new(store: Arc<dyn object_store::ObjectStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn in_memory(public_base_url: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), public_base_url)
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let store: Arc<dyn object_store::ObjectStore> = match config.backend {
            StorageBackend::Memory => Arc::new(InMemory::new()),
            StorageBackend::Local => {
                std::fs::create_dir_all(&config.local_path).map_err(|e| {
                    PlatformError::configuration(format!(
                        "Cannot create storage directory {}: {}",
                        config.local_path, e
                    ))
                })?;
                let fs = LocalFileSystem::new_with_prefix(&config.local_path)
                    .map_err(|e| PlatformError::configuration(e.to_string()))?;
                Arc::new(fs)
            }
            StorageBackend::Gcs => {
                let bucket = config.bucket.as_deref().ok_or_else(|| {
                    PlatformError::configuration("WF_STORAGE_BUCKET is required for gcs storage")
                })?;
                let gcs = GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| PlatformError::configuration(e.to_string()))?;
                Arc::new(gcs)
            }
        };

        info!(backend = ?config.backend, "Document storage initialized");
        Ok(Self::new(store, config.public_base_url.clone()))
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Store the bytes under `key`, replacing any previous object. Returns the public URL.
    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<String> {
        let location = Path::from(key);
        let size = bytes.len();
        self.store
            .put(&location, PutPayload::from(bytes))
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "Storage upload failed");
                PlatformError::storage(e.to_string())
            })?;

        info!(key = %key, size_bytes = size, "Stored document binary");
        Ok(self.url_for(key))
    }

    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let location = Path::from(key);
        let result = self.store.get(&location).await.map_err(|e| map_error(e, key))?;
        result.bytes().await.map_err(|e| map_error(e, key))
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(PlatformError::storage(e.to_string())),
        }
    }

    /// Fails with not-found when no binary exists under `key`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        // Some backends treat deleting a missing object as success
        if !self.exists(key).await? {
            return Err(PlatformError::not_found("File", key));
        }
        self.store
            .delete(&Path::from(key))
            .await
            .map_err(|e| map_error(e, key))?;

        info!(key = %key, "Deleted document binary");
        Ok(())
    }
}

fn map_error(error: ObjectStoreError, key: &str) -> PlatformError {
    match error {
        ObjectStoreError::NotFound { .. } => PlatformError::not_found("File", key),
        other => PlatformError::storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = DocumentStorage::in_memory("http://files.local/");
        let url = storage
            .put("documents/u1/invoice/a.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();

        assert_eq!(url, "http://files.local/documents/u1/invoice/a.pdf");
        assert!(storage.exists("documents/u1/invoice/a.pdf").await.unwrap());
        assert_eq!(storage.get("documents/u1/invoice/a.pdf").await.unwrap(), Bytes::from_static(b"%PDF"));

        storage.delete("documents/u1/invoice/a.pdf").await.unwrap();
        assert!(!storage.exists("documents/u1/invoice/a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_deleting_missing_binary_fails_loudly() {
        let storage = DocumentStorage::in_memory("http://files.local");
        let err = storage.delete("documents/u1/invoice/missing.pdf").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_local_backend_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: StorageBackend::Local,
            local_path: dir.path().to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        let storage = DocumentStorage::from_config(&config).unwrap();

        storage
            .put("documents/u1/certificate/c.png", Bytes::from_static(b"png"))
            .await
            .unwrap();

        let on_disk = dir.path().join("documents/u1/certificate/c.png");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"png");
    }
}
