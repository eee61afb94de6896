//! In-memory blob store.
//!
//! Used for ephemeral deployments and as the test double in service-level
//! tests. Contents are lost on process exit.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

use notevault_core::error::AppError;
use notevault_core::result::AppResult;
use notevault_core::traits::BlobStore;

/// Blob store holding all objects in a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    objects: Arc<DashMap<Uuid, Bytes>>,
}

impl MemoryBlobStore {
    /// Create an empty in-memory blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn put(&self, uid: Uuid, data: Bytes) -> AppResult<()> {
        self.objects.insert(uid, data);
        Ok(())
    }

    async fn get(&self, uid: Uuid) -> AppResult<Bytes> {
        self.objects
            .get(&uid)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Object not found: {uid}")))
    }

    async fn delete(&self, uid: Uuid) -> AppResult<()> {
        self.objects.remove(&uid);
        Ok(())
    }

    async fn size(&self, uid: Uuid) -> AppResult<u64> {
        self.objects
            .get(&uid)
            .map(|entry| entry.value().len() as u64)
            .ok_or_else(|| AppError::not_found(format!("Object not found: {uid}")))
    }

    async fn exists(&self, uid: Uuid) -> AppResult<bool> {
        Ok(self.objects.contains_key(&uid))
    }
}
