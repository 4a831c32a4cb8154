//! S3-compatible object store client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Default bucket for processed artefacts.
pub const DEFAULT_PROCESSED_BUCKET: &str = "video-processed";

/// Content type of frame archives.
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Blob storage used by the pipeline.
///
/// Buckets are passed per call: raw uploads live in whatever bucket the
/// intake message names, archives go to the processed bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `bucket/key` into `path`, returning the number of bytes written.
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64>;

    /// Upload the file at `path` to `bucket/key`, returning its size.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<u64>;

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Temporary signed GET URL for `bucket/key`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> StorageResult<String>;

    async fn check_connectivity(&self, bucket: &str) -> StorageResult<()>;
}

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL (MinIO or other S3-compatible service); AWS default when unset
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region
    pub region: String,
    /// Path-style addressing, required by MinIO
    pub force_path_style: bool,
    /// Bucket receiving frame archives
    pub processed_bucket: String,
    /// Lifetime of presigned download URLs
    pub presign_expiry: Duration,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            force_path_style: std::env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            processed_bucket: std::env::var("PROCESSED_BUCKET")
                .unwrap_or_else(|_| DEFAULT_PROCESSED_BUCKET.to_string()),
            presign_expiry: Duration::from_secs(
                std::env::var("S3_PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Create a new client from configuration.
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "framex",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Ok(Self::new(&config))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<u64> {
        debug!("Downloading {}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = aws_sdk_s3::error::DisplayErrorContext(&e).to_string();
                if message.contains("NoSuchKey") || message.contains("NoSuchBucket") {
                    StorageError::not_found(format!("{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(message)
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;
        file.flush().await?;

        info!("Downloaded {}/{} ({} bytes)", bucket, key, written);
        Ok(written)
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<u64> {
        debug!("Uploading {} to {}/{}", path.display(), bucket, key);

        let size = tokio::fs::metadata(path).await?.len();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;

        info!("Uploaded {} to {}/{} ({} bytes)", path.display(), bucket, key, size);
        Ok(size)
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = aws_sdk_s3::error::DisplayErrorContext(&e).to_string();
                if message.contains("NotFound") || message.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(message))
                }
            }
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting {}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    async fn check_connectivity(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("S3 connectivity check failed: {}", e)))?;
        Ok(())
    }
}
