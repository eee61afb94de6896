//! Blob store provider implementations.

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use notevault_core::config::StorageConfig;
use notevault_core::error::AppError;
use notevault_core::result::AppResult;
use notevault_core::traits::BlobStore;

/// Build the blob store named by the configuration.
pub async fn create_blob_store(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    match config.provider.as_str() {
        "local" => {
            let store = local::LocalBlobStore::new(&config.local.root_path).await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(memory::MemoryBlobStore::new())),
        #[cfg(feature = "s3")]
        "s3" => {
            let store = s3::S3BlobStore::new(&config.s3).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "s3"))]
        "s3" => Err(AppError::configuration(
            "S3 storage requested but notevault-storage was built without the `s3` feature",
        )),
        other => Err(AppError::configuration(format!(
            "Unknown storage provider: {other}"
        ))),
    }
}
