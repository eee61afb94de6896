//! Blob store trait for pluggable content storage backends.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::result::AppResult;

/// Trait for content blob backends.
///
/// Every non-folder item owns exactly one blob keyed by its uid. The
/// [`BlobStore`] trait is defined here in `notevault-core` and implemented
/// in `notevault-storage` for the local filesystem, in-memory, and
/// S3-compatible backends.
///
/// A `get` or `size` on a missing key fails with `NotFound`; `delete` on a
/// missing key succeeds, which keeps permanent deletion retryable.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g., "local", "s3").
    fn provider_type(&self) -> &str;

    /// Check whether the provider is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Write the full content for an item, replacing any previous object.
    async fn put(&self, uid: Uuid, data: Bytes) -> AppResult<()>;

    /// Read the full content for an item.
    async fn get(&self, uid: Uuid) -> AppResult<Bytes>;

    /// Delete the content for an item. Absent objects are not an error.
    async fn delete(&self, uid: Uuid) -> AppResult<()>;

    /// Return the size in bytes of an item's content.
    async fn size(&self, uid: Uuid) -> AppResult<u64>;

    /// Check whether an object exists for the given uid.
    async fn exists(&self, uid: Uuid) -> AppResult<bool>;
}
