//! S3-compatible blob store (AWS S3, MinIO). Requires the `s3` feature.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use notevault_core::config::storage::S3StorageConfig;
use notevault_core::error::{AppError, ErrorKind};
use notevault_core::result::AppResult;
use notevault_core::traits::BlobStore;

/// Blob store keeping one S3 object per item uid.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a new S3 blob store from configuration.
    ///
    /// A non-empty `endpoint` switches the client to path-style addressing,
    /// as required by MinIO and other S3-compatible services.
    pub async fn new(config: &S3StorageConfig) -> AppResult<Self> {
        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 blob store"
        );

        let base = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base)
            .region(Region::new(config.region.clone()));

        if !config.access_key.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "notevault-config",
            ));
        }

        if !config.endpoint.is_empty() {
            builder = builder
                .endpoint_url(config.endpoint.clone())
                .force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn health_check(&self) -> AppResult<bool> {
        let result = self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await;
        Ok(result.is_ok())
    }

    async fn put(&self, uid: Uuid, data: Bytes) -> AppResult<()> {
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(uid.to_string())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to write object: {uid}"),
                    e,
                )
            })?;

        debug!(%uid, bytes = len, "Wrote object");
        Ok(())
    }

    async fn get(&self, uid: Uuid) -> AppResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(uid.to_string())
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    AppError::not_found(format!("Object not found: {uid}"))
                } else {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to read object: {uid}"),
                        service_err,
                    )
                }
            })?;

        let data = resp.body.collect().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to collect object body: {uid}"),
                e,
            )
        })?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, uid: Uuid) -> AppResult<()> {
        // S3 delete of a missing key succeeds, matching the trait contract.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(uid.to_string())
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete object: {uid}"),
                    e,
                )
            })?;
        Ok(())
    }

    async fn size(&self, uid: Uuid) -> AppResult<u64> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(uid.to_string())
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    AppError::not_found(format!("Object not found: {uid}"))
                } else {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to stat object: {uid}"),
                        service_err,
                    )
                }
            })?;
        Ok(head.content_length().unwrap_or(0) as u64)
    }

    async fn exists(&self, uid: Uuid) -> AppResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(uid.to_string())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to stat object: {uid}"),
                e,
            )),
        }
    }
}
