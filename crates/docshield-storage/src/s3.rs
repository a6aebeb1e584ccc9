use crate::keys::check_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::ObjectStoreExt;

/// S3 storage backed by `object_store`.
///
/// A single PUT replaces the object atomically, so readers never see a
/// partially written document.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Build a client from the environment (credentials) plus explicit bucket,
    /// region and optional endpoint (MinIO and other S3-compatible stores).
    pub async fn new(
        bucket: String,
        region: String,
        endpoint: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket.clone())
            .with_region(region);
        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        let store = builder.build().map_err(|e| {
            StorageError::ConfigError(format!("Failed to build S3 object store: {}", e))
        })?;

        Ok(S3Storage { store, bucket })
    }
}

#[async_trait]
impl Storage for S3Storage {
    #[tracing::instrument(skip(self, data), fields(
        s3.bucket = %self.bucket,
        s3.key = %storage_key,
        s3.size = %data.len()
    ))]
    async fn put(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<()> {
        check_key(storage_key)?;
        let start = std::time::Instant::now();
        let size = data.len() as u64;

        let location = Path::from(storage_key.to_string());
        match self.store.put(&location, Bytes::from(data).into()).await {
            Ok(_) => {
                tracing::info!(
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, size_bytes = size, "S3 upload failed");
                Err(StorageError::UploadFailed(e.to_string()))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(s3.bucket = %self.bucket, s3.key = %storage_key))]
    async fn get(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        check_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        let response = match self.store.get(&location).await {
            Ok(response) => response,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => {
                tracing::error!(error = %e, "S3 download failed");
                return Err(StorageError::DownloadFailed(e.to_string()));
            }
        };

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    #[tracing::instrument(skip(self), fields(s3.bucket = %self.bucket, s3.key = %storage_key))]
    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        check_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        match self.store.delete(&location).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "S3 delete failed");
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        check_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
