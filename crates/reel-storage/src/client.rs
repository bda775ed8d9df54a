//! R2 client implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{fetched_path, BlobStore};
use crate::uri::{content_type_for, BlobUri};

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket used when a caller passes a bare key
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: required_env("R2_ENDPOINT_URL")?,
            access_key_id: required_env("R2_ACCESS_KEY_ID")?,
            secret_access_key: required_env("R2_SECRET_ACCESS_KEY")?,
            bucket_name: required_env("R2_BUCKET_NAME")?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }

    /// Whether any R2 variable is present, so callers can decide between
    /// "not configured" and "misconfigured".
    pub fn is_configured_in_env() -> bool {
        std::env::var("R2_ENDPOINT_URL").is_ok()
    }
}

fn required_env(name: &str) -> StorageResult<String> {
    std::env::var(name).map_err(|_| StorageError::config_error(format!("{name} not set")))
}

/// Cloudflare R2 (S3-compatible) storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for R2Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Client").field("bucket", &self.bucket).finish()
    }
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(R2Config::from_env()?))
    }

    /// Default bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a file.
    pub async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        debug!("Uploading {} to {}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(path))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}/{}", path.display(), bucket, key);
        Ok(())
    }

    /// Stream an object to a local file.
    pub async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        debug!("Downloading {}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(format!("{bucket}/{key}"))
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path).await?;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("Downloaded {}/{} to {}", bucket, key, path.display());
        Ok(())
    }

    /// Check if an object exists.
    pub async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let message = e.to_string();
                if message.contains("NotFound") || message.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(message))
                }
            }
        }
    }

    /// Check connectivity by performing a head bucket operation on the default bucket.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("R2 connectivity check failed: {}", e)))?;
        Ok(())
    }

    fn object_ref(uri: &str) -> StorageResult<(String, String)> {
        match BlobUri::parse(uri)? {
            BlobUri::Object { bucket, key, .. } => Ok((bucket, key)),
            BlobUri::Local(path) => Err(StorageError::UnsupportedScheme(format!(
                "{} is not an object URI",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl BlobStore for R2Client {
    async fn fetch(&self, uri: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        let parsed = BlobUri::parse(uri)?;
        let (bucket, key) = Self::object_ref(uri)?;
        let dest = fetched_path(&parsed, dest_dir)?;
        self.download_file(&bucket, &key, &dest).await?;
        Ok(dest)
    }

    async fn store(&self, local: &Path, uri: &str) -> StorageResult<String> {
        let (bucket, key) = Self::object_ref(uri)?;
        self.upload_file(&bucket, &key, local).await?;
        Ok(uri.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref() {
        let (bucket, key) = R2Client::object_ref("s3://media/shows/ep1.mp4").unwrap();
        assert_eq!(bucket, "media");
        assert_eq!(key, "shows/ep1.mp4");
        assert!(R2Client::object_ref("/local/file.mp4").is_err());
    }

    #[test]
    fn test_client_builds_without_network() {
        let client = R2Client::new(R2Config {
            endpoint_url: "http://127.0.0.1:9000".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            bucket_name: "reels".into(),
            region: "auto".into(),
        });
        assert_eq!(client.bucket(), "reels");
    }
}
