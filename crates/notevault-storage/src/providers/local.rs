//! Local filesystem blob store.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use notevault_core::error::{AppError, ErrorKind};
use notevault_core::result::AppResult;
use notevault_core::traits::BlobStore;

/// Blob store keeping one file per item uid under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    /// Root directory for all stored objects.
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local blob store rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    fn object_path(&self, uid: Uuid) -> PathBuf {
        self.root.join(uid.to_string())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.exists() && self.root.is_dir())
    }

    async fn put(&self, uid: Uuid, data: Bytes) -> AppResult<()> {
        let path = self.object_path(uid);
        fs::write(&path, &data).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to write object: {uid}"),
                e,
            )
        })?;

        debug!(%uid, bytes = data.len(), "Wrote object");
        Ok(())
    }

    async fn get(&self, uid: Uuid) -> AppResult<Bytes> {
        let path = self.object_path(uid);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {uid}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read object: {uid}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, uid: Uuid) -> AppResult<()> {
        let path = self.object_path(uid);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%uid, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete object: {uid}"),
                e,
            )),
        }
    }

    async fn size(&self, uid: Uuid) -> AppResult<u64> {
        let path = self.object_path(uid);
        let meta = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {uid}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to stat object: {uid}"),
                    e,
                )
            }
        })?;
        Ok(meta.len())
    }

    async fn exists(&self, uid: Uuid) -> AppResult<bool> {
        Ok(self.object_path(uid).exists())
    }
}
